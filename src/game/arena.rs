//! Arena state and authoritative tick loop
//!
//! One arena is one authority: a single task owns every weapon, health
//! value, and hit computation inside it. Clients reach it through an
//! input channel; everything they see back is a scoped event relayed
//! over a broadcast channel.

use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::health::{DamageOutcome, HealthConfig, HealthSystem};
use crate::game::hit::{CharacterTarget, HitResolver, ShotEffect, ShotParams};
use crate::game::observer::{ObserverId, ObserverRegistry};
use crate::game::scene::{ArenaScene, CollisionLayer, SpawnPoint};
use crate::game::snapshot::SnapshotBuilder;
use crate::game::spawner::WeaponSpawner;
use crate::game::weapon::{
    AmmoChange, FireDecision, RoundOutcome, WeaponConfig, WeaponInstance,
};
use crate::util::scheduler::TaskScheduler;
use crate::util::time::{SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, FireMode, PlayerInfo, ServerMsg, Vec3, WeaponInfo};

use super::PlayerInput;

/// Delivery scope for a relayed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    /// Every observer in the arena
    All,
    /// Only the named player's connection
    Player(Uuid),
}

/// An authoritative outcome relayed to observers
#[derive(Debug, Clone)]
pub struct ArenaEvent {
    pub scope: EventScope,
    pub msg: ServerMsg,
}

/// Tasks the arena schedules against its own tick counter
#[derive(Debug, Clone, Copy)]
enum ArenaTask {
    /// Restore automatic-fire readiness on a weapon
    ResetCooldown(Uuid),
    /// Replace a picked-up weapon at the indexed spawner
    RespawnWeapon(usize),
}

/// A connected character (authoritative)
#[derive(Debug)]
pub struct PlayerState {
    pub id: Uuid,
    pub display_name: String,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub health: i32,
    /// Weapon held by this character, if any. Attachment is one-way.
    pub weapon: Option<Uuid>,
    pub last_input_seq: u32,
    pub health_observers: ObserverRegistry<i32>,
}

impl PlayerState {
    fn info(&self) -> PlayerInfo {
        PlayerInfo {
            player_id: self.id,
            display_name: self.display_name.clone(),
            armed: self.weapon.is_some(),
        }
    }
}

/// Arena state (owned by the arena task)
#[derive(Debug)]
pub struct ArenaState {
    pub id: Uuid,
    pub seed: u64,
    pub tick: u64,
    pub players: HashMap<Uuid, PlayerState>,
    pub weapons: HashMap<Uuid, WeaponInstance>,
    pub scene: ArenaScene,
    pub spawners: Vec<WeaponSpawner>,
    pub rng: ChaCha8Rng,
    pub max_players: usize,
}

/// Handle to a running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub events_tx: broadcast::Sender<ArenaEvent>,
    pub player_count: Arc<AtomicUsize>,
}

impl ArenaHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// Registry of all active arenas
pub struct ArenaRegistry {
    arenas: DashMap<Uuid, ArenaHandle>,
    max_players: usize,
}

impl ArenaRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            arenas: DashMap::new(),
            max_players,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<ArenaHandle> {
        self.arenas.get(id).map(|a| a.value().clone())
    }

    pub fn active_arenas(&self) -> usize {
        self.arenas.len()
    }

    pub fn total_players(&self) -> usize {
        self.arenas.iter().map(|a| a.value().player_count()).sum()
    }

    /// Find an arena with a free slot, or create one and spawn its task
    pub fn find_or_create(self: &Arc<Self>) -> ArenaHandle {
        for entry in self.arenas.iter() {
            if entry.value().player_count() < self.max_players {
                return entry.value().clone();
            }
        }

        let id = Uuid::new_v4();
        let seed = rand::random::<u64>();
        let (arena, handle) = GameArena::new(id, seed, self.max_players);
        self.arenas.insert(id, handle.clone());

        let registry = self.clone();
        tokio::spawn(async move {
            arena.run().await;
            registry.arenas.remove(&id);
        });

        info!(arena_id = %id, "Created new arena");
        handle
    }
}

/// The authoritative game arena
pub struct GameArena {
    state: ArenaState,
    input_rx: mpsc::Receiver<PlayerInput>,
    events_tx: broadcast::Sender<ArenaEvent>,
    /// Internal event queue; observer callbacks and handlers both feed
    /// it so relay order matches resolution order
    outbound_tx: mpsc::UnboundedSender<ArenaEvent>,
    outbound_rx: mpsc::UnboundedReceiver<ArenaEvent>,
    /// Pickup notifications routed from weapon observer registries
    pickup_tx: mpsc::UnboundedSender<Uuid>,
    pickup_rx: mpsc::UnboundedReceiver<Uuid>,
    scheduler: TaskScheduler<ArenaTask>,
    resolver: HitResolver,
    health: HealthSystem,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    /// Arena-held subscription ids, released on entity teardown
    health_subs: HashMap<Uuid, ObserverId>,
    weapon_subs: HashMap<Uuid, (ObserverId, ObserverId)>,
    had_players: bool,
}

impl GameArena {
    /// Create an arena with the default scene layout and two weapon
    /// spawners
    pub fn new(id: Uuid, seed: u64, max_players: usize) -> (Self, ArenaHandle) {
        let spawners = vec![
            WeaponSpawner::new(Vec3::new(4.0, 0.0, 0.5), WeaponConfig::default()),
            WeaponSpawner::new(Vec3::new(-4.0, 0.0, 0.5), WeaponConfig::default()),
        ];
        Self::with_scene(id, seed, max_players, ArenaScene::default_layout(), spawners)
    }

    /// Create an arena over an explicit scene and spawner set
    pub fn with_scene(
        id: Uuid,
        seed: u64,
        max_players: usize,
        scene: ArenaScene,
        spawners: Vec<WeaponSpawner>,
    ) -> (Self, ArenaHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (events_tx, _) = broadcast::channel(256);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (pickup_tx, pickup_rx) = mpsc::unbounded_channel();
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            id,
            input_tx,
            events_tx: events_tx.clone(),
            player_count: player_count.clone(),
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let mut arena = Self {
            state: ArenaState {
                id,
                seed,
                tick: 0,
                players: HashMap::new(),
                weapons: HashMap::new(),
                scene,
                spawners,
                rng: ChaCha8Rng::seed_from_u64(seed),
                max_players,
            },
            input_rx,
            events_tx,
            outbound_tx,
            outbound_rx,
            pickup_tx,
            pickup_rx,
            scheduler: TaskScheduler::new(),
            resolver: HitResolver::new(CollisionLayer::ShotTrace),
            health: HealthSystem::new(HealthConfig::default()),
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            player_count,
            health_subs: HashMap::new(),
            weapon_subs: HashMap::new(),
            had_players: false,
        };

        for idx in 0..arena.state.spawners.len() {
            arena.spawn_weapon(idx);
        }

        (arena, handle)
    }

    pub fn state(&self) -> &ArenaState {
        &self.state
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(arena_id = %self.state.id, "Arena started");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain input queue
            while let Ok(input) = self.input_rx.try_recv() {
                self.apply(input);
            }

            // Run simulation tick
            self.tick();

            // Shut down once everyone has left
            if self.had_players && self.state.players.is_empty() {
                info!(arena_id = %self.state.id, "All players left, closing arena");
                break;
            }
        }
    }

    /// Apply one client message to the authoritative state
    pub fn apply(&mut self, input: PlayerInput) {
        let player_id = input.player_id;
        match input.msg {
            ClientMsg::Join { display_name } => self.handle_join(player_id, display_name),
            ClientMsg::Move {
                seq,
                position,
                yaw,
                pitch,
            } => self.handle_move(player_id, seq, position, yaw, pitch),
            ClientMsg::FireRequest {
                mode,
                origin,
                direction,
            } => self.handle_fire(player_id, mode, origin, direction),
            ClientMsg::StartCharge => self.handle_start_charge(player_id),
            ClientMsg::Reload => self.handle_reload(player_id),
            ClientMsg::ToggleMode => self.handle_toggle_mode(player_id),
            ClientMsg::Ping { t } => {
                self.emit(EventScope::Player(player_id), ServerMsg::Pong { t });
            }
            ClientMsg::Leave => self.handle_leave(player_id),
        }
        self.flush_outbound();
    }

    /// Run a single simulation tick
    pub fn tick(&mut self) {
        self.state.tick += 1;

        for task in self.scheduler.drain_due(self.state.tick) {
            match task {
                ArenaTask::ResetCooldown(weapon_id) => {
                    // The weapon may have been torn down since scheduling;
                    // despawn cancels the task, but tolerate a miss anyway
                    if let Some(weapon) = self.state.weapons.get_mut(&weapon_id) {
                        weapon.reset_cooldown();
                    }
                }
                ArenaTask::RespawnWeapon(spawner_idx) => {
                    if self
                        .state
                        .spawners
                        .get(spawner_idx)
                        .map(|s| s.ready_to_spawn())
                        .unwrap_or(false)
                    {
                        self.spawn_weapon(spawner_idx);
                    }
                }
            }
        }

        self.state.scene.integrate_props();
        self.update_pickups();
        self.process_pickup_notifications();

        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot_builder.build(
                self.state.tick,
                &self.state.players,
                &self.state.scene.props,
            );
            self.emit(EventScope::All, snapshot);
        }

        self.flush_outbound();
    }

    fn handle_join(&mut self, player_id: Uuid, display_name: String) {
        if self.state.players.contains_key(&player_id) {
            warn!(player_id = %player_id, "Player already in arena");
            return;
        }

        if self.state.players.len() >= self.state.max_players {
            self.emit(
                EventScope::Player(player_id),
                ServerMsg::Error {
                    code: "arena_full".to_string(),
                    message: "Arena is full".to_string(),
                },
            );
            return;
        }

        let spawn = self.choose_spawn_point().unwrap_or(SpawnPoint {
            position: Vec3::ZERO,
            yaw: 0.0,
        });

        let mut player = PlayerState {
            id: player_id,
            display_name,
            position: spawn.position,
            yaw: spawn.yaw,
            pitch: 0.0,
            health: self.health.max_health(),
            weapon: None,
            last_input_seq: 0,
            health_observers: ObserverRegistry::new(),
        };

        let relay_tx = self.outbound_tx.clone();
        let sub = player.health_observers.subscribe(move |health: &i32| {
            let _ = relay_tx.send(ArenaEvent {
                scope: EventScope::All,
                msg: ServerMsg::HealthChanged {
                    player_id,
                    health: *health,
                },
            });
        });
        self.health_subs.insert(player_id, sub);

        let info = player.info();
        self.state.players.insert(player_id, player);
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);
        self.had_players = true;

        self.emit(EventScope::All, ServerMsg::PlayerJoined { player: info });

        let players: Vec<PlayerInfo> = self.state.players.values().map(|p| p.info()).collect();
        let weapons: Vec<WeaponInfo> = self
            .state
            .weapons
            .values()
            .filter(|w| !w.attached())
            .map(|w| WeaponInfo {
                weapon_id: w.id,
                position: w.position,
            })
            .collect();
        let props = self
            .state
            .scene
            .props
            .iter()
            .map(|p| crate::ws::protocol::PropSnapshot {
                prop_id: p.id,
                position: p.position,
            })
            .collect();

        self.emit(
            EventScope::Player(player_id),
            ServerMsg::ArenaJoined {
                arena_id: self.state.id,
                players,
                weapons,
                props,
            },
        );

        info!(
            arena_id = %self.state.id,
            player_id = %player_id,
            player_count = self.state.players.len(),
            "Player joined arena"
        );
    }

    fn handle_move(&mut self, player_id: Uuid, seq: u32, position: Vec3, yaw: f32, pitch: f32) {
        if let Some(player) = self.state.players.get_mut(&player_id) {
            if seq > player.last_input_seq {
                player.last_input_seq = seq;
                player.position = position;
                player.yaw = yaw;
                player.pitch = pitch;
            }
        }
    }

    fn handle_fire(&mut self, player_id: Uuid, mode: FireMode, origin: Vec3, direction: Vec3) {
        let weapon_id = match self.state.players.get(&player_id).and_then(|p| p.weapon) {
            Some(weapon_id) => weapon_id,
            None => {
                debug!(player_id = %player_id, "Fire request without a weapon");
                return;
            }
        };

        let (stats, max_distance, impulse_base) = {
            let weapon = match self.state.weapons.get_mut(&weapon_id) {
                Some(weapon) => weapon,
                None => return,
            };

            let stats = match weapon.request_fire(mode) {
                FireDecision::Accepted(stats) => stats,
                FireDecision::Rejected(reason) => {
                    debug!(player_id = %player_id, ?mode, ?reason, "Fire request rejected");
                    return;
                }
            };

            // The cooldown restore is armed on acceptance, before the
            // ammo check - an empty magazine must not leave automatic
            // fire locked out
            if mode == FireMode::Automatic {
                let task = self.scheduler.schedule_once(
                    self.state.tick,
                    weapon.config.automatic_cooldown,
                    ArenaTask::ResetCooldown(weapon_id),
                );
                weapon.cooldown_task = Some(task);
            }

            match weapon.consume_round() {
                RoundOutcome::Fired { .. } => {}
                RoundOutcome::OutOfAmmo => {
                    self.outbound_tx
                        .send(ArenaEvent {
                            scope: EventScope::Player(player_id),
                            msg: ServerMsg::WeaponEmpty,
                        })
                        .ok();
                    return;
                }
            }

            (
                stats,
                weapon.config.max_distance,
                weapon.config.impulse_base,
            )
        };

        // Authoritative resolution; the shooter's own body is not a target
        let targets: Vec<CharacterTarget> = self
            .state
            .players
            .values()
            .filter(|p| p.id != player_id)
            .map(|p| CharacterTarget {
                id: p.id,
                position: p.position,
            })
            .collect();

        let shot = ShotParams {
            origin,
            direction,
            max_distance,
            damage: stats.damage,
            impact_modifier: stats.impact_modifier,
            impulse_base,
        };
        let resolution = self.resolver.resolve(&self.state.scene, &targets, &shot);

        match resolution.effect {
            ShotEffect::Damage { target, amount } => self.apply_damage_to(target, amount),
            ShotEffect::Impulse { prop, impulse, .. } => {
                if let Some(prop) = self.state.scene.props.iter_mut().find(|p| p.id == prop) {
                    prop.apply_impulse(impulse);
                }
            }
            ShotEffect::None => {}
        }

        // Relayed only after the attempt is fully resolved
        self.emit(
            EventScope::All,
            ServerMsg::FireVisual {
                shooter_id: player_id,
                origin,
                endpoint: resolution.endpoint,
            },
        );
    }

    fn apply_damage_to(&mut self, target_id: Uuid, amount: i32) {
        let spawn = self.choose_spawn_point();

        let player = match self.state.players.get_mut(&target_id) {
            Some(player) => player,
            None => return,
        };

        let outcome = self.health.apply_damage(&mut player.health, amount, spawn);

        match outcome {
            DamageOutcome::Respawned { spawn, .. } => {
                player.position = spawn.position;
                player.yaw = spawn.yaw;
            }
            DamageOutcome::NoSpawnPoint { health } => {
                warn!(
                    player_id = %target_id,
                    health,
                    "No spawn point available, character stuck with negative health"
                );
            }
            DamageOutcome::Survived { .. } => {}
        }

        player.health_observers.notify(&outcome.health());
    }

    fn handle_start_charge(&mut self, player_id: Uuid) {
        let charging = self
            .state
            .players
            .get(&player_id)
            .and_then(|p| p.weapon)
            .and_then(|weapon_id| self.state.weapons.get(&weapon_id))
            .map(|weapon| weapon.start_charge())
            .unwrap_or(false);

        if charging {
            self.emit(EventScope::All, ServerMsg::ChargeCue { player_id });
        }
    }

    fn handle_reload(&mut self, player_id: Uuid) {
        let weapon_id = match self.state.players.get(&player_id).and_then(|p| p.weapon) {
            Some(weapon_id) => weapon_id,
            None => return,
        };

        if let Some(weapon) = self.state.weapons.get_mut(&weapon_id) {
            weapon.reload();
            self.emit(EventScope::All, ServerMsg::ReloadCue { player_id });
        }
    }

    fn handle_toggle_mode(&mut self, player_id: Uuid) {
        let weapon_id = match self.state.players.get(&player_id).and_then(|p| p.weapon) {
            Some(weapon_id) => weapon_id,
            None => return,
        };

        if let Some(weapon) = self.state.weapons.get_mut(&weapon_id) {
            weapon.toggle_mode();
        }
    }

    fn handle_leave(&mut self, player_id: Uuid) {
        let held_weapon = match self.state.players.get_mut(&player_id) {
            Some(player) => {
                if let Some(sub) = self.health_subs.remove(&player_id) {
                    player.health_observers.unsubscribe(sub);
                }
                player.weapon
            }
            None => return,
        };

        self.state.players.remove(&player_id);
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        // A held weapon never returns to the ground; tear it down with
        // its owner
        if let Some(weapon_id) = held_weapon {
            self.despawn_weapon(weapon_id);
        }

        self.emit(
            EventScope::All,
            ServerMsg::PlayerLeft {
                player_id,
                reason: "disconnected".to_string(),
            },
        );

        info!(
            arena_id = %self.state.id,
            player_id = %player_id,
            "Player left arena"
        );
    }

    /// Proximity pickup detection for ground weapons
    fn update_pickups(&mut self) {
        let contacts: Vec<(Uuid, Uuid)> = self
            .state
            .weapons
            .values()
            .filter(|w| !w.attached())
            .filter_map(|w| {
                self.state
                    .players
                    .values()
                    .find(|p| p.position.distance(w.position) <= w.config.pickup_radius)
                    .map(|p| (w.id, p.id))
            })
            .collect();

        for (weapon_id, player_id) in contacts {
            // Pickup observers fire on contact regardless of whether the
            // attach succeeds, so the spawner's respawn cycle restarts
            // either way
            if let Some(weapon) = self.state.weapons.get_mut(&weapon_id) {
                weapon.pickup_observers.notify(&player_id);
            }

            let already_armed = self
                .state
                .players
                .get(&player_id)
                .map(|p| p.weapon.is_some())
                .unwrap_or(true);

            if already_armed {
                // Attach-once: a second weapon destroys itself instead
                // of attaching
                self.despawn_weapon(weapon_id);
                continue;
            }

            if let Some(weapon) = self.state.weapons.get_mut(&weapon_id) {
                weapon.holder = Some(player_id);
            }
            if let Some(player) = self.state.players.get_mut(&player_id) {
                player.weapon = Some(weapon_id);
            }

            self.emit(
                EventScope::All,
                ServerMsg::WeaponPickedUp {
                    weapon_id,
                    player_id,
                },
            );

            debug!(player_id = %player_id, weapon_id = %weapon_id, "Weapon picked up");
        }
    }

    /// Route pickup notifications to the owning spawners and schedule
    /// their respawns
    fn process_pickup_notifications(&mut self) {
        while let Ok(weapon_id) = self.pickup_rx.try_recv() {
            for idx in 0..self.state.spawners.len() {
                if self.state.spawners[idx].on_pickup(weapon_id) {
                    let delay = self.state.spawners[idx].respawn_delay;
                    let task = self.scheduler.schedule_once(
                        self.state.tick,
                        delay,
                        ArenaTask::RespawnWeapon(idx),
                    );
                    self.state.spawners[idx].respawn_task = Some(task);
                    break;
                }
            }
        }
    }

    /// Spawn a fresh weapon at the indexed spawner and wire up its
    /// observer registries
    fn spawn_weapon(&mut self, spawner_idx: usize) {
        let (position, config) = {
            let spawner = &self.state.spawners[spawner_idx];
            (spawner.position, spawner.weapon_config.clone())
        };

        let weapon_id = Uuid::new_v4();
        let mut weapon = WeaponInstance::new(weapon_id, config, position);

        let relay_tx = self.outbound_tx.clone();
        let ammo_sub = weapon.ammo_observers.subscribe(move |change: &AmmoChange| {
            // Ammo counts go to the owning client only, for UI
            if let Some(holder) = change.holder {
                let _ = relay_tx.send(ArenaEvent {
                    scope: EventScope::Player(holder),
                    msg: ServerMsg::AmmoChanged { ammo: change.ammo },
                });
            }
        });

        let pickup_tx = self.pickup_tx.clone();
        let pickup_sub = weapon
            .pickup_observers
            .subscribe(move |_character: &Uuid| {
                let _ = pickup_tx.send(weapon_id);
            });

        self.weapon_subs.insert(weapon_id, (ammo_sub, pickup_sub));
        self.state.spawners[spawner_idx].weapon_spawned(weapon_id);

        self.emit(
            EventScope::All,
            ServerMsg::WeaponSpawned {
                weapon: WeaponInfo {
                    weapon_id,
                    position,
                },
            },
        );

        self.state.weapons.insert(weapon_id, weapon);
    }

    /// Remove a weapon from the world: cancel its pending cooldown,
    /// release the arena's subscriptions, and tell observers
    fn despawn_weapon(&mut self, weapon_id: Uuid) {
        let mut weapon = match self.state.weapons.remove(&weapon_id) {
            Some(weapon) => weapon,
            None => return,
        };

        if let Some(task) = weapon.cooldown_task.take() {
            self.scheduler.cancel(task);
        }

        if let Some((ammo_sub, pickup_sub)) = self.weapon_subs.remove(&weapon_id) {
            weapon.ammo_observers.unsubscribe(ammo_sub);
            weapon.pickup_observers.unsubscribe(pickup_sub);
        }

        self.emit(EventScope::All, ServerMsg::WeaponDespawned { weapon_id });
    }

    fn choose_spawn_point(&mut self) -> Option<SpawnPoint> {
        if self.state.scene.spawn_points.is_empty() {
            return None;
        }
        let idx = self.state.rng.gen_range(0..self.state.scene.spawn_points.len());
        Some(self.state.scene.spawn_points[idx])
    }

    fn emit(&self, scope: EventScope, msg: ServerMsg) {
        let _ = self.outbound_tx.send(ArenaEvent { scope, msg });
    }

    /// Forward queued events to the broadcast channel, preserving the
    /// order they were produced in
    fn flush_outbound(&mut self) {
        while let Ok(event) = self.outbound_rx.try_recv() {
            let _ = self.events_tx.send(event);
        }
    }
}

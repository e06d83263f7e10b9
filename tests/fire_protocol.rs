//! Black-box tests for the authoritative fire protocol, driving an
//! arena directly through the library API the way a session task does.

use tokio::sync::broadcast;
use uuid::Uuid;

use arena_shooter_server::game::arena::ArenaState;
use arena_shooter_server::game::scene::{ArenaScene, PhysicsProp, SpawnPoint};
use arena_shooter_server::game::spawner::WeaponSpawner;
use arena_shooter_server::game::weapon::WeaponConfig;
use arena_shooter_server::game::{ArenaEvent, EventScope, GameArena, PlayerInput};
use arena_shooter_server::ws::protocol::{ClientMsg, FireMode, ServerMsg, Vec3};

const SPAWN: Vec3 = Vec3 {
    x: 10.0,
    y: 10.0,
    z: 0.9,
};

/// One spawn point far from the action, one weapon spawner at the origin
fn test_arena() -> (GameArena, broadcast::Receiver<ArenaEvent>) {
    let mut scene = ArenaScene::empty();
    scene.spawn_points.push(SpawnPoint {
        position: SPAWN,
        yaw: 0.0,
    });

    let spawners = vec![WeaponSpawner::new(
        Vec3::new(0.0, 0.0, 0.5),
        WeaponConfig::default(),
    )];

    let (arena, handle) = GameArena::with_scene(Uuid::new_v4(), 7, 16, scene, spawners);
    let events = handle.events_tx.subscribe();
    (arena, events)
}

fn input(player_id: Uuid, msg: ClientMsg) -> PlayerInput {
    PlayerInput {
        player_id,
        msg,
        received_at: 0,
    }
}

fn drain(rx: &mut broadcast::Receiver<ArenaEvent>) -> Vec<ArenaEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn join(arena: &mut GameArena, name: &str) -> Uuid {
    let player_id = Uuid::new_v4();
    arena.apply(input(
        player_id,
        ClientMsg::Join {
            display_name: name.to_string(),
        },
    ));
    player_id
}

fn move_to(arena: &mut GameArena, player_id: Uuid, seq: u32, position: Vec3) {
    arena.apply(input(
        player_id,
        ClientMsg::Move {
            seq,
            position,
            yaw: 0.0,
            pitch: 0.0,
        },
    ));
}

fn fire(arena: &mut GameArena, player_id: Uuid, mode: FireMode, direction: Vec3) {
    let origin = arena.state().players[&player_id].position;
    arena.apply(input(
        player_id,
        ClientMsg::FireRequest {
            mode,
            origin,
            direction,
        },
    ));
}

/// Join, walk onto the spawner's weapon, tick once to pick it up
fn join_armed(arena: &mut GameArena, name: &str) -> Uuid {
    let player_id = join(arena, name);
    move_to(arena, player_id, 1, Vec3::new(0.0, 0.0, 0.9));
    arena.tick();
    assert!(
        arena.state().players[&player_id].weapon.is_some(),
        "player should have picked up the spawner weapon"
    );
    player_id
}

fn held_weapon(state: &ArenaState, player_id: Uuid) -> Uuid {
    state.players[&player_id].weapon.expect("player is armed")
}

#[tokio::test]
async fn join_pickup_and_initial_state() {
    let (mut arena, mut events) = test_arena();

    let player_id = join(&mut arena, "Tester");
    assert_eq!(arena.state().players[&player_id].position, SPAWN);
    assert_eq!(arena.state().players[&player_id].health, 100);

    let joined = drain(&mut events);
    assert!(joined
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::WeaponSpawned { .. })));
    assert!(joined
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::PlayerJoined { .. })));
    // The world description goes to the joining player only
    assert!(joined.iter().any(|e| {
        matches!(&e.msg, ServerMsg::ArenaJoined { weapons, .. } if weapons.len() == 1)
            && e.scope == EventScope::Player(player_id)
    }));

    move_to(&mut arena, player_id, 1, Vec3::new(0.0, 0.0, 0.9));
    arena.tick();

    let picked_up = drain(&mut events);
    assert!(picked_up.iter().any(|e| matches!(
        &e.msg,
        ServerMsg::WeaponPickedUp { player_id: p, .. } if *p == player_id
    )));
    assert!(arena.state().players[&player_id].weapon.is_some());
}

#[tokio::test]
async fn full_magazine_then_empty_then_reload() {
    let (mut arena, mut events) = test_arena();
    let shooter = join_armed(&mut arena, "Shooter");
    drain(&mut events);

    let forward = Vec3::new(1.0, 0.0, 0.0);
    for _ in 0..30 {
        fire(&mut arena, shooter, FireMode::Single, forward);
    }

    let weapon_id = held_weapon(arena.state(), shooter);
    assert_eq!(arena.state().weapons[&weapon_id].ammo_current, 0);

    let fired = drain(&mut events);
    let visuals = fired
        .iter()
        .filter(|e| matches!(&e.msg, ServerMsg::FireVisual { .. }))
        .count();
    assert_eq!(visuals, 30);

    // Every ammo update is addressed to the shooter alone
    let ammo_counts: Vec<u16> = fired
        .iter()
        .filter_map(|e| match &e.msg {
            ServerMsg::AmmoChanged { ammo } => {
                assert_eq!(e.scope, EventScope::Player(shooter));
                Some(*ammo)
            }
            _ => None,
        })
        .collect();
    assert_eq!(ammo_counts.len(), 30);
    assert_eq!(ammo_counts.first(), Some(&29));
    assert_eq!(ammo_counts.last(), Some(&0));

    // 31st pull: empty cue for the owner, no tracer, count stays at zero
    fire(&mut arena, shooter, FireMode::Single, forward);
    let empty = drain(&mut events);
    assert!(empty.iter().any(|e| {
        matches!(&e.msg, ServerMsg::WeaponEmpty) && e.scope == EventScope::Player(shooter)
    }));
    assert!(!empty
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::FireVisual { .. })));
    assert_eq!(arena.state().weapons[&weapon_id].ammo_current, 0);

    arena.apply(input(shooter, ClientMsg::Reload));
    let reloaded = drain(&mut events);
    assert_eq!(arena.state().weapons[&weapon_id].ammo_current, 30);
    assert!(reloaded.iter().any(|e| {
        matches!(&e.msg, ServerMsg::AmmoChanged { ammo: 30 })
            && e.scope == EventScope::Player(shooter)
    }));
    assert!(reloaded.iter().any(|e| {
        matches!(&e.msg, ServerMsg::ReloadCue { player_id } if *player_id == shooter)
            && e.scope == EventScope::All
    }));
}

#[tokio::test]
async fn automatic_mode_gates_on_cooldown() {
    let (mut arena, mut events) = test_arena();
    let shooter = join_armed(&mut arena, "Shooter");
    arena.apply(input(shooter, ClientMsg::ToggleMode));
    drain(&mut events);

    let forward = Vec3::new(1.0, 0.0, 0.0);

    // Two requests inside one cooldown window: exactly one tracer
    fire(&mut arena, shooter, FireMode::Automatic, forward);
    fire(&mut arena, shooter, FireMode::Automatic, forward);

    let burst = drain(&mut events);
    let visuals = burst
        .iter()
        .filter(|e| matches!(&e.msg, ServerMsg::FireVisual { .. }))
        .count();
    assert_eq!(visuals, 1);

    // 0.2s cooldown is 6 ticks; wait it out and fire again
    for _ in 0..7 {
        arena.tick();
    }
    fire(&mut arena, shooter, FireMode::Automatic, forward);

    let after_cooldown = drain(&mut events);
    assert!(after_cooldown
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::FireVisual { .. })));
}

#[tokio::test]
async fn stale_mode_requests_are_dropped_silently() {
    let (mut arena, mut events) = test_arena();
    let shooter = join_armed(&mut arena, "Shooter");
    drain(&mut events);

    // Weapon is in Single mode; an automatic request is stale
    fire(&mut arena, shooter, FireMode::Automatic, Vec3::new(1.0, 0.0, 0.0));

    let events = drain(&mut events);
    assert!(!events
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::FireVisual { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::Error { .. })));

    let weapon_id = held_weapon(arena.state(), shooter);
    assert_eq!(arena.state().weapons[&weapon_id].ammo_current, 30);
}

#[tokio::test]
async fn lethal_hit_respawns_target_at_spawn_point() {
    let (mut arena, mut events) = test_arena();

    let target = join(&mut arena, "Target");
    let shooter = join_armed(&mut arena, "Shooter");
    move_to(&mut arena, target, 1, Vec3::new(5.0, 0.0, 0.9));

    // Charged shots do 4 damage: 25 drop the target to exactly zero,
    // the 26th sends health below zero and triggers the respawn
    arena.apply(input(shooter, ClientMsg::ToggleMode));
    arena.apply(input(shooter, ClientMsg::ToggleMode));
    drain(&mut events);

    let forward = Vec3::new(1.0, 0.0, 0.0);
    for _ in 0..25 {
        fire(&mut arena, shooter, FireMode::Charged, forward);
    }
    assert_eq!(arena.state().players[&target].health, 0);
    assert_eq!(arena.state().players[&target].position, Vec3::new(5.0, 0.0, 0.9));

    fire(&mut arena, shooter, FireMode::Charged, forward);
    assert_eq!(arena.state().players[&target].health, 100);
    assert_eq!(arena.state().players[&target].position, SPAWN);

    // Observers saw the post-resolution values: a zero, then full health
    let health_values: Vec<i32> = drain(&mut events)
        .iter()
        .filter_map(|e| match &e.msg {
            ServerMsg::HealthChanged { player_id, health } if *player_id == target => {
                Some(*health)
            }
            _ => None,
        })
        .collect();
    assert_eq!(health_values.len(), 26);
    assert_eq!(health_values[24], 0);
    assert_eq!(health_values[25], 100);
}

#[tokio::test]
async fn tracer_is_relayed_only_after_resolution() {
    let (mut arena, mut events) = test_arena();

    let target = join(&mut arena, "Target");
    let shooter = join_armed(&mut arena, "Shooter");
    move_to(&mut arena, target, 1, Vec3::new(5.0, 0.0, 0.9));
    drain(&mut events);

    fire(&mut arena, shooter, FireMode::Single, Vec3::new(1.0, 0.0, 0.0));

    let shot_events = drain(&mut events);
    let health_idx = shot_events
        .iter()
        .position(|e| matches!(&e.msg, ServerMsg::HealthChanged { .. }))
        .expect("hit should change health");
    let visual_idx = shot_events
        .iter()
        .position(|e| matches!(&e.msg, ServerMsg::FireVisual { .. }))
        .expect("shot should relay a tracer");

    assert!(
        health_idx < visual_idx,
        "visual relay must follow authoritative resolution"
    );
}

#[tokio::test]
async fn shot_pushes_simulated_prop_without_damage() {
    let (mut arena, mut events) = {
        let mut scene = ArenaScene::empty();
        scene.spawn_points.push(SpawnPoint {
            position: SPAWN,
            yaw: 0.0,
        });
        scene
            .props
            .push(PhysicsProp::new(Vec3::new(3.0, 10.0, 0.9), 0.4, 10.0));

        let spawners = vec![WeaponSpawner::new(
            Vec3::new(0.0, 0.0, 0.5),
            WeaponConfig::default(),
        )];
        let (arena, handle) = GameArena::with_scene(Uuid::new_v4(), 7, 16, scene, spawners);
        let events = handle.events_tx.subscribe();
        (arena, events)
    };

    let shooter = join_armed(&mut arena, "Shooter");
    move_to(&mut arena, shooter, 2, SPAWN);
    drain(&mut events);

    // Shoot along -x from the spawn point straight at the crate
    fire(&mut arena, shooter, FireMode::Single, Vec3::new(-1.0, 0.0, 0.0));

    let prop = &arena.state().scene.props[0];
    assert!(prop.velocity.x < 0.0, "impulse should push the crate away");

    let shot_events = drain(&mut events);
    assert!(!shot_events
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::HealthChanged { .. })));
    assert!(shot_events
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::FireVisual { .. })));
}

#[tokio::test]
async fn second_weapon_destroys_itself_and_respawns_later() {
    let mut scene = ArenaScene::empty();
    scene.spawn_points.push(SpawnPoint {
        position: SPAWN,
        yaw: 0.0,
    });
    let spawners = vec![
        WeaponSpawner::new(Vec3::new(0.0, 0.0, 0.5), WeaponConfig::default()),
        WeaponSpawner::new(Vec3::new(3.0, 0.0, 0.5), WeaponConfig::default()),
    ];
    let (mut arena, handle) = GameArena::with_scene(Uuid::new_v4(), 7, 16, scene, spawners);
    let mut events = handle.events_tx.subscribe();

    let player = join(&mut arena, "Collector");
    move_to(&mut arena, player, 1, Vec3::new(0.0, 0.0, 0.9));
    arena.tick();

    let first_weapon = held_weapon(arena.state(), player);
    drain(&mut events);

    // Walking onto the second weapon while armed destroys it
    move_to(&mut arena, player, 2, Vec3::new(3.0, 0.0, 0.9));
    arena.tick();

    assert_eq!(held_weapon(arena.state(), player), first_weapon);
    assert_eq!(arena.state().weapons.len(), 1);

    let contact = drain(&mut events);
    assert!(contact
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::WeaponDespawned { .. })));
    assert!(!contact
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::WeaponPickedUp { .. })));

    // Step away so the replacements are not swallowed immediately
    move_to(&mut arena, player, 3, SPAWN);

    // Both spawners restart their cycle on pickup contact, whether the
    // weapon attached or destroyed itself; after the 5s delay each has
    // a fresh weapon on the ground
    for _ in 0..152 {
        arena.tick();
    }

    let respawned = drain(&mut events);
    let spawned = respawned
        .iter()
        .filter(|e| matches!(&e.msg, ServerMsg::WeaponSpawned { .. }))
        .count();
    assert_eq!(spawned, 2);
    assert_eq!(arena.state().weapons.len(), 3);
}

#[tokio::test]
async fn charge_cue_is_broadcast_only_in_charged_mode() {
    let (mut arena, mut events) = test_arena();
    let shooter = join_armed(&mut arena, "Shooter");
    drain(&mut events);

    // Single mode: no cue
    arena.apply(input(shooter, ClientMsg::StartCharge));
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(&e.msg, ServerMsg::ChargeCue { .. })));

    arena.apply(input(shooter, ClientMsg::ToggleMode));
    arena.apply(input(shooter, ClientMsg::ToggleMode));
    arena.apply(input(shooter, ClientMsg::StartCharge));

    let cues = drain(&mut events);
    assert!(cues.iter().any(|e| {
        matches!(&e.msg, ServerMsg::ChargeCue { player_id } if *player_id == shooter)
            && e.scope == EventScope::All
    }));
}

#[tokio::test]
async fn unarmed_requests_are_noops() {
    let (mut arena, mut events) = test_arena();
    let player = join(&mut arena, "Unarmed");
    drain(&mut events);

    fire(&mut arena, player, FireMode::Single, Vec3::new(1.0, 0.0, 0.0));
    arena.apply(input(player, ClientMsg::Reload));
    arena.apply(input(player, ClientMsg::ToggleMode));
    arena.apply(input(player, ClientMsg::StartCharge));

    let silent = drain(&mut events);
    assert!(silent.is_empty(), "unarmed requests must not produce events");
}

#[tokio::test]
async fn leaving_tears_down_player_and_held_weapon() {
    let (mut arena, mut events) = test_arena();
    let player = join_armed(&mut arena, "Leaver");
    let weapon_id = held_weapon(arena.state(), player);
    drain(&mut events);

    arena.apply(input(player, ClientMsg::Leave));

    assert!(arena.state().players.is_empty());
    assert!(!arena.state().weapons.contains_key(&weapon_id));

    let teardown = drain(&mut events);
    assert!(teardown.iter().any(|e| matches!(
        &e.msg,
        ServerMsg::WeaponDespawned { weapon_id: w } if *w == weapon_id
    )));
    assert!(teardown.iter().any(|e| matches!(
        &e.msg,
        ServerMsg::PlayerLeft { player_id: p, .. } if *p == player
    )));
}

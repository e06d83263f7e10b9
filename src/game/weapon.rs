//! Weapon state - ammunition, fire modes, cooldown gating

use uuid::Uuid;

use crate::game::observer::ObserverRegistry;
use crate::util::scheduler::TaskHandle;
use crate::ws::protocol::{FireMode, Vec3};

/// Static weapon configuration
#[derive(Debug, Clone)]
pub struct WeaponConfig {
    /// Magazine capacity
    pub ammo_max: u16,
    /// Cooldown between automatic shots (seconds)
    pub automatic_cooldown: f32,
    /// Maximum hit-scan distance
    pub max_distance: f32,
    /// Base impulse applied to physics bodies, scaled by the mode's
    /// impact modifier
    pub impulse_base: f32,
    /// Distance at which a character picks the weapon up
    pub pickup_radius: f32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            ammo_max: 30,
            automatic_cooldown: 0.2,
            max_distance: 10.0,
            impulse_base: 50.0,
            pickup_radius: 1.2,
        }
    }
}

/// Damage and impulse parameters per fire mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeStats {
    /// Damage dealt to a character hit
    pub damage: i32,
    /// Multiplier on the impulse applied to a physics body hit
    pub impact_modifier: f32,
}

impl ModeStats {
    pub fn for_mode(mode: FireMode) -> Self {
        match mode {
            FireMode::Single => Self {
                damage: 2,
                impact_modifier: 1.0,
            },
            FireMode::Automatic => Self {
                damage: 1,
                impact_modifier: 0.5,
            },
            FireMode::Charged => Self {
                damage: 4,
                impact_modifier: 5.0,
            },
        }
    }
}

/// Outcome of a fire request against the mode state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FireDecision {
    Accepted(ModeStats),
    Rejected(FireRejection),
}

/// Why a fire request was turned down. Rejections are expected transient
/// races, not faults - callers drop the request silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireRejection {
    /// Requested mode does not match the weapon's current mode
    ModeMismatch,
    /// Automatic shot still cooling down
    CoolingDown,
}

/// Outcome of consuming a round from the magazine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Fired { remaining: u16 },
    OutOfAmmo,
}

/// Ammo-changed event delivered to observers
#[derive(Debug, Clone, Copy)]
pub struct AmmoChange {
    /// Character currently holding the weapon, if any
    pub holder: Option<Uuid>,
    pub ammo: u16,
}

/// A weapon in the world - unattached on the ground, or held by exactly
/// one character for the rest of its life
#[derive(Debug)]
pub struct WeaponInstance {
    pub id: Uuid,
    pub config: WeaponConfig,
    pub mode: FireMode,
    pub ammo_current: u16,
    pub cooldown_ready: bool,
    /// Character holding the weapon; None while on the ground
    pub holder: Option<Uuid>,
    /// World position, meaningful while unattached
    pub position: Vec3,
    /// Pending cooldown-reset task, cancelled on teardown
    pub cooldown_task: Option<TaskHandle>,
    pub ammo_observers: ObserverRegistry<AmmoChange>,
    pub pickup_observers: ObserverRegistry<Uuid>,
}

impl WeaponInstance {
    /// Create an unattached weapon with a full magazine
    pub fn new(id: Uuid, config: WeaponConfig, position: Vec3) -> Self {
        let ammo_current = config.ammo_max;
        Self {
            id,
            config,
            mode: FireMode::default(),
            ammo_current,
            cooldown_ready: true,
            holder: None,
            position,
            cooldown_task: None,
            ammo_observers: ObserverRegistry::new(),
            pickup_observers: ObserverRegistry::new(),
        }
    }

    pub fn attached(&self) -> bool {
        self.holder.is_some()
    }

    /// Validate a fire request against the current mode and cooldown.
    /// Accepting an Automatic shot flips `cooldown_ready` off; the caller
    /// schedules the reset.
    pub fn request_fire(&mut self, mode: FireMode) -> FireDecision {
        if mode != self.mode {
            return FireDecision::Rejected(FireRejection::ModeMismatch);
        }

        if mode == FireMode::Automatic {
            if !self.cooldown_ready {
                return FireDecision::Rejected(FireRejection::CoolingDown);
            }
            self.cooldown_ready = false;
        }

        FireDecision::Accepted(ModeStats::for_mode(mode))
    }

    /// Restore automatic fire readiness (scheduled task callback)
    pub fn reset_cooldown(&mut self) {
        self.cooldown_ready = true;
        self.cooldown_task = None;
    }

    /// Cycle Single -> Automatic -> Charged -> Single. Leaves any
    /// in-flight cooldown state untouched.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            FireMode::Single => FireMode::Automatic,
            FireMode::Automatic => FireMode::Charged,
            FireMode::Charged => FireMode::Single,
        };
    }

    /// Whether a charge cue should play. Charging changes no state; the
    /// release arrives later as an ordinary Charged fire request.
    pub fn start_charge(&self) -> bool {
        self.mode == FireMode::Charged
    }

    /// Take one round from the magazine. Observers are notified with the
    /// new count only when a round was actually consumed.
    pub fn consume_round(&mut self) -> RoundOutcome {
        if self.ammo_current == 0 {
            return RoundOutcome::OutOfAmmo;
        }

        self.ammo_current -= 1;
        self.ammo_observers.notify(&AmmoChange {
            holder: self.holder,
            ammo: self.ammo_current,
        });

        RoundOutcome::Fired {
            remaining: self.ammo_current,
        }
    }

    /// Unconditionally refill the magazine and notify observers.
    /// No partial reload and no reload lockout.
    pub fn reload(&mut self) {
        self.ammo_current = self.config.ammo_max;
        self.ammo_observers.notify(&AmmoChange {
            holder: self.holder,
            ammo: self.ammo_current,
        });
    }
}

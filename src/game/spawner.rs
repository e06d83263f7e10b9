//! Weapon spawners - keep a pickup available at fixed points

use uuid::Uuid;

use crate::game::weapon::WeaponConfig;
use crate::util::scheduler::TaskHandle;
use crate::ws::protocol::Vec3;

/// Default delay before a picked-up weapon is replaced (seconds)
pub const WEAPON_RESPAWN_DELAY: f32 = 5.0;

/// Spawns a weapon at a fixed point and replaces it a fixed delay after
/// each pickup. At most one live weapon per spawner at a time.
#[derive(Debug)]
pub struct WeaponSpawner {
    pub position: Vec3,
    pub weapon_config: WeaponConfig,
    pub respawn_delay: f32,
    /// The currently live spawned weapon, if any
    pub pending_weapon: Option<Uuid>,
    /// Pending respawn task, if a pickup already happened
    pub respawn_task: Option<TaskHandle>,
}

impl WeaponSpawner {
    pub fn new(position: Vec3, weapon_config: WeaponConfig) -> Self {
        Self {
            position,
            weapon_config,
            respawn_delay: WEAPON_RESPAWN_DELAY,
            pending_weapon: None,
            respawn_task: None,
        }
    }

    /// Record a freshly spawned weapon as this spawner's live instance
    pub fn weapon_spawned(&mut self, weapon_id: Uuid) {
        self.pending_weapon = Some(weapon_id);
        self.respawn_task = None;
    }

    /// React to a pickup notification. Returns true when the picked-up
    /// weapon was this spawner's live instance, meaning the caller should
    /// schedule a respawn.
    pub fn on_pickup(&mut self, weapon_id: Uuid) -> bool {
        if self.pending_weapon != Some(weapon_id) {
            return false;
        }
        self.pending_weapon = None;
        true
    }

    /// A respawn may proceed only while no live weapon exists. The
    /// respawn timer is idempotent in this check: a duplicate firing
    /// finds the slot occupied and does nothing.
    pub fn ready_to_spawn(&self) -> bool {
        self.pending_weapon.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pickup_of_own_weapon_frees_the_slot() {
        let mut spawner = WeaponSpawner::new(Vec3::ZERO, WeaponConfig::default());
        let weapon_id = Uuid::new_v4();

        spawner.weapon_spawned(weapon_id);
        assert!(!spawner.ready_to_spawn());

        assert!(spawner.on_pickup(weapon_id));
        assert!(spawner.ready_to_spawn());
        assert!(spawner.pending_weapon.is_none());
    }

    #[test]
    fn pickup_of_foreign_weapon_is_ignored() {
        let mut spawner = WeaponSpawner::new(Vec3::ZERO, WeaponConfig::default());
        let own = Uuid::new_v4();

        spawner.weapon_spawned(own);
        assert!(!spawner.on_pickup(Uuid::new_v4()));
        assert_eq!(spawner.pending_weapon, Some(own));
    }

    #[test]
    fn duplicate_pickup_notification_is_idempotent() {
        let mut spawner = WeaponSpawner::new(Vec3::ZERO, WeaponConfig::default());
        let weapon_id = Uuid::new_v4();

        spawner.weapon_spawned(weapon_id);
        assert!(spawner.on_pickup(weapon_id));
        assert!(!spawner.on_pickup(weapon_id));
    }
}

//! Health and respawn - authoritative damage application

use crate::game::scene::SpawnPoint;

/// Character health configuration
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    pub max_health: i32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { max_health: 100 }
    }
}

/// Result of one authoritative damage application
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Health dropped but stayed at zero or above
    Survived { health: i32 },
    /// Health went below zero; it was reset to max and the character
    /// must be relocated to the returned spawn point
    Respawned { health: i32, spawn: SpawnPoint },
    /// Health went below zero but no spawn point exists; the character
    /// is stuck in place with negative health
    NoSpawnPoint { health: i32 },
}

impl DamageOutcome {
    /// Health value to report to observers: always the post-resolution
    /// value, whichever branch was taken
    pub fn health(&self) -> i32 {
        match self {
            DamageOutcome::Survived { health }
            | DamageOutcome::Respawned { health, .. }
            | DamageOutcome::NoSpawnPoint { health } => *health,
        }
    }
}

/// Applies damage and decides respawns. A character at exactly zero
/// health is still standing; only a drop below zero triggers a respawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthSystem {
    config: HealthConfig,
}

impl HealthSystem {
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }

    pub fn max_health(&self) -> i32 {
        self.config.max_health
    }

    /// Decrement health. If it falls below zero and a spawn point is
    /// available, restore full health and report where to relocate;
    /// without a spawn point the negative value sticks.
    pub fn apply_damage(
        &self,
        health: &mut i32,
        amount: i32,
        spawn: Option<SpawnPoint>,
    ) -> DamageOutcome {
        *health -= amount;

        if *health >= 0 {
            return DamageOutcome::Survived { health: *health };
        }

        match spawn {
            Some(spawn) => {
                *health = self.config.max_health;
                DamageOutcome::Respawned {
                    health: *health,
                    spawn,
                }
            }
            None => DamageOutcome::NoSpawnPoint { health: *health },
        }
    }
}

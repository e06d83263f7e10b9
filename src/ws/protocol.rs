//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 3D vector used on the wire and throughout the simulation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        self.sub(other).length()
    }

    /// Unit-length copy, or None for zero/non-finite input
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if !len.is_finite() || len <= f32::EPSILON {
            return None;
        }
        Some(self.scale(1.0 / len))
    }
}

/// Weapon fire modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    /// One shot per trigger pull
    Single,
    /// Rapid fire, throttled by a cooldown between shots
    Automatic,
    /// Charge-up cue followed by a single heavy shot
    Charged,
}

impl Default for FireMode {
    fn default() -> Self {
        Self::Single
    }
}

/// Messages sent from client to the authority
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request to join an arena
    Join {
        /// Display name shown to other players
        display_name: String,
    },

    /// Client-predicted movement state for this tick
    Move {
        /// Sequence number for stale-update rejection
        seq: u32,
        position: Vec3,
        /// View yaw in radians
        yaw: f32,
        /// View pitch in radians
        pitch: f32,
    },

    /// Fire the held weapon. Origin and direction come from the client's
    /// camera pose; everything else about the shot is computed by the
    /// authority.
    FireRequest {
        mode: FireMode,
        origin: Vec3,
        direction: Vec3,
    },

    /// Begin charging a shot (cue only, no resource change)
    StartCharge,

    /// Refill the held weapon's magazine
    Reload,

    /// Cycle the held weapon's fire mode
    ToggleMode,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the arena
    Leave,
}

/// Messages sent from the authority to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: Uuid, server_time: u64 },

    /// Confirmation of arena join, with the current world state
    ArenaJoined {
        arena_id: Uuid,
        players: Vec<PlayerInfo>,
        /// Weapons currently lying on the ground
        weapons: Vec<WeaponInfo>,
        props: Vec<PropSnapshot>,
    },

    /// Player joined the arena
    PlayerJoined { player: PlayerInfo },

    /// Player left the arena
    PlayerLeft { player_id: Uuid, reason: String },

    /// World state snapshot (sent at regular intervals)
    Snapshot {
        /// Server tick number
        tick: u64,
        players: Vec<PlayerSnapshot>,
        props: Vec<PropSnapshot>,
    },

    /// Tracer line for a resolved shot; observers draw it and play the
    /// fire sound/animation locally
    FireVisual {
        shooter_id: Uuid,
        origin: Vec3,
        endpoint: Vec3,
    },

    /// New ammunition count for the held weapon (owner only)
    AmmoChanged { ammo: u16 },

    /// Empty-weapon cue (owner only)
    WeaponEmpty,

    /// Reload cue, audio-only
    ReloadCue { player_id: Uuid },

    /// Charge-up cue, audio-only
    ChargeCue { player_id: Uuid },

    /// A character's health changed
    HealthChanged { player_id: Uuid, health: i32 },

    /// A weapon appeared on the ground
    WeaponSpawned { weapon: WeaponInfo },

    /// A weapon was picked up and attached
    WeaponPickedUp { weapon_id: Uuid, player_id: Uuid },

    /// A weapon was removed from the world
    WeaponDespawned { weapon_id: Uuid },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player info for join/lobby messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: Uuid,
    pub display_name: String,
    /// Whether the player currently holds a weapon
    pub armed: bool,
}

/// Ground weapon info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponInfo {
    pub weapon_id: Uuid,
    pub position: Vec3,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: Uuid,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub health: i32,
    pub armed: bool,
    /// Last processed movement sequence
    pub last_input_seq: u32,
}

/// Physics prop state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropSnapshot {
    pub prop_id: Uuid,
    pub position: Vec3,
}

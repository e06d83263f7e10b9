//! Game simulation modules

pub mod arena;
pub mod health;
pub mod hit;
pub mod observer;
pub mod scene;
pub mod snapshot;
pub mod spawner;
pub mod weapon;

pub use arena::{ArenaEvent, ArenaHandle, ArenaRegistry, EventScope, GameArena, PlayerState};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Player input received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}

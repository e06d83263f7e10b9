//! Snapshot building for periodic state replication

use std::collections::HashMap;
use uuid::Uuid;

use crate::game::scene::PhysicsProp;
use crate::ws::protocol::{PlayerSnapshot, PropSnapshot, ServerMsg};

use super::arena::PlayerState;

/// Builds world snapshots for network transmission
#[derive(Debug)]
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Build a snapshot message
    pub fn build(
        &self,
        tick: u64,
        players: &HashMap<Uuid, PlayerState>,
        props: &[PhysicsProp],
    ) -> ServerMsg {
        let player_snapshots: Vec<PlayerSnapshot> = players
            .values()
            .map(|p| PlayerSnapshot {
                player_id: p.id,
                position: p.position,
                yaw: p.yaw,
                pitch: p.pitch,
                health: p.health,
                armed: p.weapon.is_some(),
                last_input_seq: p.last_input_seq,
            })
            .collect();

        let prop_snapshots: Vec<PropSnapshot> = props
            .iter()
            .map(|prop| PropSnapshot {
                prop_id: prop.id,
                position: prop.position,
            })
            .collect();

        ServerMsg::Snapshot {
            tick,
            players: player_snapshots,
            props: prop_snapshots,
        }
    }
}

//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second
pub const SNAPSHOT_TPS: u32 = 20; // 20 snapshots per second

/// Calculate delta time for simulation (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Convert a duration in seconds to a whole number of simulation ticks.
/// Always at least one tick so a scheduled task can never fire on the
/// tick that scheduled it.
pub fn secs_to_ticks(secs: f32) -> u64 {
    ((secs * SIMULATION_TPS as f32).ceil() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_to_ticks_rounds_up() {
        assert_eq!(secs_to_ticks(0.2), 6);
        assert_eq!(secs_to_ticks(1.0), 30);
        assert_eq!(secs_to_ticks(0.21), 7);
    }

    #[test]
    fn secs_to_ticks_never_zero() {
        assert_eq!(secs_to_ticks(0.0), 1);
        assert_eq!(secs_to_ticks(0.001), 1);
    }
}

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
pub const PHYSICS_TPS: u32 = 60; // render-rate physics steps per second
pub const SNAPSHOT_TPS: u32 = 20; // 20 snapshots per second
pub const PHYSICS_TICK: Duration = Duration::from_micros(1_000_000 / PHYSICS_TPS as u64);

/// Round countdown granularity
pub const ROUND_TIMER_PERIOD: Duration = Duration::from_secs(1);

/// Physics ticks between snapshots
pub fn snapshot_interval_ticks() -> u32 {
    (PHYSICS_TPS / SNAPSHOT_TPS).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_interval_divides_tick_rate() {
        assert_eq!(snapshot_interval_ticks(), 3);
        assert_eq!(PHYSICS_TICK, Duration::from_micros(16_666));
    }
}

//! Time utilities for the simulation tick chain

use std::time::Duration;

use tokio::time::Instant;

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 simulation steps per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Velocity/position iteration hint passed to the physics step
pub const SIMULATION_ACCURACY: u32 = 10;

/// Nominal delay between two scheduled simulation steps
pub fn tick_interval() -> Duration {
    Duration::from_secs_f64(1.0 / SIMULATION_TPS as f64)
}

/// Seconds elapsed between a baseline and `now`, saturating at zero
pub fn elapsed_secs(since: Instant, now: Instant) -> f32 {
    now.saturating_duration_since(since).as_secs_f32()
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(std::time::Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_matches_frame_rate() {
        let interval = tick_interval();
        assert!((interval.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(TICK_DURATION_MICROS, 16_666);
    }

    #[test]
    fn elapsed_secs_saturates_when_clock_goes_backwards() {
        let now = Instant::now();
        let later = now + Duration::from_millis(250);
        assert!((elapsed_secs(now, later) - 0.25).abs() < 1e-6);
        assert_eq!(elapsed_secs(later, now), 0.0);
    }
}

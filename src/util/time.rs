//! Time utilities for game simulation

use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the Unix epoch. Stamps inputs that arrive
/// without a client timestamp.
pub fn unix_millis() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    since_epoch.as_millis() as u64
}

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Record process start. Later calls keep the first instant.
pub fn init_server_time() {
    STARTED_AT.get_or_init(Instant::now);
}

/// Whole seconds since `init_server_time`, or 0 before it ran
pub fn uptime_secs() -> u64 {
    STARTED_AT.get().map_or(0, |start| start.elapsed().as_secs())
}

/// Simulation and snapshot rate. Every tick is one snapshot.
pub const TICK_RATE: u32 = 60;
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / TICK_RATE as u64;

/// Fixed simulation step in seconds. Never measured from the wall clock.
pub fn tick_delta() -> f64 {
    1.0 / TICK_RATE as f64
}

/// Wall-clock spacing of the tick timer
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

/// Measures how long one tick took
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::warn;

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

/// Default simulation rate
pub const DEFAULT_TICK_RATE: u32 = 60;

/// A pacing window below this fraction of the target rate counts as degraded
pub const SLOW_TICK_RATIO: f32 = 0.8;

/// Wall-clock length of one tick
pub fn tick_duration(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.max(1) as u64)
}

/// Delta time for physics (in seconds)
pub fn tick_delta(tick_rate: u32) -> f32 {
    1.0 / tick_rate.max(1) as f32
}

/// Result of one closed pacing window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingReport {
    pub measured_tick_rate: f32,
    pub degraded: bool,
}

/// Measures the achieved tick rate over fixed windows and warns the first
/// time it falls below `SLOW_TICK_RATIO` of the target.
#[derive(Debug, Clone)]
pub struct PacingMonitor {
    target_tick_rate: u32,
    window: Duration,
    window_start: Instant,
    ticks: u32,
    reported: bool,
}

impl PacingMonitor {
    pub fn new(target_tick_rate: u32, now: Instant) -> Self {
        Self {
            target_tick_rate,
            window: Duration::from_secs(1),
            window_start: now,
            ticks: 0,
            reported: false,
        }
    }

    /// Count a tick; returns a report when a window closes
    pub fn record_tick(&mut self, now: Instant) -> Option<PacingReport> {
        self.ticks += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let measured_tick_rate = self.ticks as f32 / elapsed.as_secs_f32();
        let degraded = measured_tick_rate < self.target_tick_rate as f32 * SLOW_TICK_RATIO;
        if degraded && !self.reported {
            self.reported = true;
            warn!(
                target_tick_rate = self.target_tick_rate,
                measured_tick_rate,
                "Tick rate appears to be low; clients may see corrections"
            );
        }

        self.window_start = now;
        self.ticks = 0;
        Some(PacingReport {
            measured_tick_rate,
            degraded,
        })
    }

    /// Whether a degraded window has been seen
    pub fn has_reported(&self) -> bool {
        self.reported
    }
}

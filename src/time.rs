//! Fixed-timestep tick clock for the draw loop.
//!
//! The renderer calls at display rate with wall-clock timestamps; game logic
//! runs at a fixed tick rate. Large gaps (backgrounded tab) are clamped to a
//! handful of ticks — catching up on elapsed time is the energy
//! regenerator's job, which works from raw timestamps, not ticks.

/// Logic ticks per second.
pub const TICKS_PER_SEC: u32 = 10;

/// Largest per-frame gap converted into ticks.
const MAX_FRAME_GAP_MS: f64 = 500.0;

pub struct TickClock {
    ms_per_tick: f64,
    accumulator: f64,
    last_timestamp: Option<f64>,
}

impl TickClock {
    pub fn new() -> Self {
        Self {
            ms_per_tick: 1_000.0 / TICKS_PER_SEC as f64,
            accumulator: 0.0,
            last_timestamp: None,
        }
    }

    /// Feed the current epoch-ms timestamp once per frame; returns how many
    /// whole ticks to run. Sub-tick remainders carry over to the next frame.
    pub fn advance(&mut self, now_ms: f64) -> u32 {
        let delta = match self.last_timestamp {
            Some(prev) => (now_ms - prev).clamp(0.0, MAX_FRAME_GAP_MS),
            None => 0.0,
        };
        self.last_timestamp = Some(now_ms);
        self.accumulator += delta;
        let ticks = (self.accumulator / self.ms_per_tick) as u32;
        self.accumulator -= ticks as f64 * self.ms_per_tick;
        ticks
    }
}

/// Current wall clock in epoch milliseconds.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1_000.0)
        .unwrap_or(0.0)
}

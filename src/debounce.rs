//! Timestamp-driven debouncer.
//!
//! Collapses a burst of triggers into one action: the action fires after a
//! quiet window with no new triggers, or — so a continuous stream of
//! triggers cannot starve the flush — once a maximum wait has elapsed since
//! the first trigger of the burst. No wall-clock access inside; callers feed
//! `now_ms`, which keeps every consumer deterministic under test.

pub struct Debouncer {
    quiet_ms: f64,
    max_wait_ms: f64,
    first_trigger: Option<f64>,
    last_trigger: Option<f64>,
}

impl Debouncer {
    pub fn new(quiet_ms: f64, max_wait_ms: f64) -> Self {
        Self {
            quiet_ms,
            max_wait_ms,
            first_trigger: None,
            last_trigger: None,
        }
    }

    /// Record a triggering event at `now_ms`.
    pub fn mark(&mut self, now_ms: f64) {
        if self.first_trigger.is_none() {
            self.first_trigger = Some(now_ms);
        }
        self.last_trigger = Some(now_ms);
    }

    pub fn is_pending(&self) -> bool {
        self.last_trigger.is_some()
    }

    /// Whether the pending burst is due at `now_ms`.
    pub fn ready(&self, now_ms: f64) -> bool {
        let (first, last) = match (self.first_trigger, self.last_trigger) {
            (Some(f), Some(l)) => (f, l),
            _ => return false,
        };
        now_ms - last >= self.quiet_ms || now_ms - first >= self.max_wait_ms
    }

    /// Consume the pending burst. Call after acting on `ready`.
    pub fn clear(&mut self) {
        self.first_trigger = None;
        self.last_trigger = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer() -> Debouncer {
        Debouncer::new(500.0, 1000.0)
    }

    #[test]
    fn idle_is_never_ready() {
        let d = debouncer();
        assert!(!d.is_pending());
        assert!(!d.ready(1e9));
    }

    #[test]
    fn fires_after_quiet_window() {
        let mut d = debouncer();
        d.mark(0.0);
        assert!(!d.ready(499.0));
        assert!(d.ready(500.0));
    }

    #[test]
    fn new_triggers_extend_the_quiet_window() {
        let mut d = debouncer();
        d.mark(0.0);
        d.mark(400.0);
        assert!(!d.ready(700.0)); // 300ms since last trigger
        assert!(d.ready(900.0));
    }

    #[test]
    fn continuous_stream_flushes_at_max_wait() {
        let mut d = debouncer();
        let mut now = 0.0;
        while now < 1_000.0 {
            d.mark(now);
            now += 100.0; // always inside the quiet window
        }
        assert!(d.ready(1_000.0));
    }

    #[test]
    fn clear_resets_both_windows() {
        let mut d = debouncer();
        d.mark(0.0);
        assert!(d.ready(600.0));
        d.clear();
        assert!(!d.is_pending());
        assert!(!d.ready(600.0));
        // A fresh burst starts a fresh max-wait window.
        d.mark(2_000.0);
        assert!(!d.ready(2_400.0));
        assert!(d.ready(2_500.0));
    }
}

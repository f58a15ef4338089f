//! Debouncer - delays committing a rapidly changing value.
//!
//! When a value changes rapidly (e.g., dragging the opacity slider), we don't
//! want one committed edit per mouse-move. Instead:
//! 1. Every change replaces the pending value and restarts the timer
//! 2. Once the delay elapses with no further change, `tick_at()` hands the
//!    last value out exactly once
//!
//! The timer is polled, never a thread. Every time-dependent method takes the
//! current instant, so callers and tests control the clock.

use std::time::{Duration, Instant};

/// Default commit delay for slider-driven edits
pub const DEFAULT_DELAY_MS: u64 = 200;

/// Single-slot debouncer.
///
/// # Usage
/// ```ignore
/// // On slider move:
/// debouncer.schedule_at(value, Instant::now());
///
/// // In update loop:
/// if let Some(value) = debouncer.tick_at(Instant::now()) {
///     commit(value);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    /// Quiet period required before the pending value fires
    delay: Duration,
    /// Pending value: (value, trigger_time)
    pending: Option<(T, Instant)>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MS)
    }
}

impl<T> Debouncer<T> {
    /// Create with custom delay
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: None,
        }
    }

    /// Schedule a delayed commit of `value` measured from `now`.
    /// If already pending, replaces the value and resets the timer.
    pub fn schedule_at(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
        log::trace!("Debouncer: scheduled commit in {}ms", self.delay.as_millis());
    }

    /// Cancel any pending commit
    pub fn cancel(&mut self) {
        if self.pending.is_some() {
            log::trace!("Debouncer: cancelled pending commit");
        }
        self.pending = None;
    }

    /// Returns the pending value once the delay has elapsed, None otherwise.
    /// Clears the pending state when triggered.
    pub fn tick_at(&mut self, now: Instant) -> Option<T> {
        let trigger_at = self.pending.as_ref()?.1;
        if now >= trigger_at {
            log::trace!("Debouncer: firing");
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    /// Check if there's a pending commit
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Peek at the pending value (if any)
    pub fn pending_value(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_no_trigger() {
        let mut debouncer = Debouncer::new(100);
        let now = Instant::now();

        debouncer.schedule_at(0.5, now);
        assert!(debouncer.is_pending());
        assert!(debouncer.tick_at(now).is_none());
    }

    #[test]
    fn test_trigger_after_delay() {
        let mut debouncer = Debouncer::new(10);
        let now = Instant::now();

        debouncer.schedule_at(42, now);
        assert_eq!(debouncer.tick_at(now + Duration::from_millis(15)), Some(42));
        assert!(!debouncer.is_pending());
        // fires only once
        assert_eq!(debouncer.tick_at(now + Duration::from_millis(30)), None);
    }

    #[test]
    fn test_debounce_resets_timer() {
        let mut debouncer = Debouncer::new(50);
        let t0 = Instant::now();

        debouncer.schedule_at(1, t0);
        debouncer.schedule_at(2, t0 + Duration::from_millis(30));

        // 60ms after the first schedule but only 30ms after the second
        assert!(debouncer.tick_at(t0 + Duration::from_millis(60)).is_none());
        assert_eq!(debouncer.pending_value(), Some(&2));
        assert_eq!(debouncer.tick_at(t0 + Duration::from_millis(80)), Some(2));
    }

    #[test]
    fn test_cancel() {
        let mut debouncer = Debouncer::new(DEFAULT_DELAY_MS);
        let now = Instant::now();
        debouncer.schedule_at("x", now);
        debouncer.cancel();
        assert!(debouncer.tick_at(now + Duration::from_secs(1)).is_none());
    }
}

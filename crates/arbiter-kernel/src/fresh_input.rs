//! [`FreshInput`] – latest-value cache for one inbound stream.
//!
//! Every sensor stream the arbiter listens to is wrapped in a `FreshInput`.
//! The bus side calls [`FreshInput::update`] whenever a message arrives; the
//! behavior logic asks [`FreshInput::is_active`] (or [`FreshInput::active`])
//! before trusting the value.  A value older than the staleness threshold is
//! treated exactly like no value at all.
//!
//! There is no queue: each update overwrites the previous one.

use std::time::{Duration, Instant};

/// Latest value of an inbound stream together with its arrival time.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use arbiter_kernel::FreshInput;
///
/// let t0 = Instant::now();
/// let mut input = FreshInput::new();
/// input.update(42u32, t0);
///
/// let threshold = Duration::from_secs(1);
/// assert!(input.is_active(t0 + Duration::from_millis(500), threshold));
/// assert!(!input.is_active(t0 + Duration::from_secs(2), threshold));
/// ```
#[derive(Debug, Clone)]
pub struct FreshInput<T> {
    latest: Option<(T, Instant)>,
}

impl<T> Default for FreshInput<T> {
    fn default() -> Self {
        Self { latest: None }
    }
}

impl<T> FreshInput<T> {
    /// Create an empty cache.  It stays inactive until the first update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` as having arrived at `now`, replacing anything older.
    pub fn update(&mut self, value: T, now: Instant) {
        self.latest = Some((value, now));
    }

    /// `true` if a value was ever stored and it is no older than `threshold`.
    ///
    /// An arrival time later than `now` counts as age zero.
    pub fn is_active(&self, now: Instant, threshold: Duration) -> bool {
        match &self.latest {
            Some((_, arrived)) => now.saturating_duration_since(*arrived) <= threshold,
            None => false,
        }
    }

    /// The stored value, but only while it is fresh.
    pub fn active(&self, now: Instant, threshold: Duration) -> Option<&T> {
        if self.is_active(now, threshold) {
            self.peek()
        } else {
            None
        }
    }

    /// The last stored value regardless of its age.
    ///
    /// Callers deciding behavior should use [`FreshInput::active`] instead.
    pub fn peek(&self) -> Option<&T> {
        self.latest.as_ref().map(|(value, _)| value)
    }

    /// Arrival time of the last stored value.
    pub fn received_at(&self) -> Option<Instant> {
        self.latest.as_ref().map(|(_, arrived)| *arrived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(1);

    #[test]
    fn never_updated_is_inactive() {
        let input: FreshInput<u8> = FreshInput::new();
        assert!(!input.is_active(Instant::now(), THRESHOLD));
        assert!(input.peek().is_none());
        assert!(input.received_at().is_none());
    }

    #[test]
    fn fresh_value_is_active() {
        let t0 = Instant::now();
        let mut input = FreshInput::new();
        input.update("track", t0);
        assert!(input.is_active(t0, THRESHOLD));
        assert_eq!(input.active(t0, THRESHOLD), Some(&"track"));
    }

    #[test]
    fn age_equal_to_threshold_is_still_active() {
        let t0 = Instant::now();
        let mut input = FreshInput::new();
        input.update(1, t0);
        assert!(input.is_active(t0 + THRESHOLD, THRESHOLD));
    }

    #[test]
    fn value_goes_stale_after_threshold() {
        let t0 = Instant::now();
        let mut input = FreshInput::new();
        input.update(1, t0);
        let later = t0 + THRESHOLD + Duration::from_millis(1);
        assert!(!input.is_active(later, THRESHOLD));
        assert!(input.active(later, THRESHOLD).is_none());
        // The value is still there for diagnostics.
        assert_eq!(input.peek(), Some(&1));
    }

    #[test]
    fn update_overwrites_and_refreshes() {
        let t0 = Instant::now();
        let mut input = FreshInput::new();
        input.update(1, t0);
        let t1 = t0 + Duration::from_secs(5);
        assert!(!input.is_active(t1, THRESHOLD));

        input.update(2, t1);
        assert!(input.is_active(t1, THRESHOLD));
        assert_eq!(input.peek(), Some(&2));
        assert_eq!(input.received_at(), Some(t1));
    }

    #[test]
    fn arrival_after_now_counts_as_fresh() {
        let t0 = Instant::now();
        let mut input = FreshInput::new();
        input.update((), t0 + Duration::from_millis(10));
        assert!(input.is_active(t0, THRESHOLD));
    }
}

//! Monotonic time sources.
//!
//! Everything that reasons about age (cache entries, rate-limit windows) reads
//! time through [`Clock`] so tests can drive it explicitly. Both clocks hand
//! out [`tokio::time::Instant`], which follows a paused tokio runtime.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Stand-in for "never" when a deadline would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `instant + by`, clamped to a far-future instant instead of panicking.
pub(crate) fn saturating_add(instant: Instant, by: Duration) -> Instant {
    instant
        .checked_add(by)
        .or_else(|| instant.checked_add(FAR_FUTURE))
        .unwrap_or(instant)
}

/// Source of monotonic timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time from the tokio timer (honours `tokio::time::pause`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Cloning shares the underlying offset, so a test can keep one handle and
/// give the other to a cache.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self
            .offset
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *offset = offset.saturating_add(by);
    }

    /// Total time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        *self
            .offset
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        saturating_add(self.origin, self.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_only_on_demand() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - start, Duration::from_secs(5));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));
    }

    #[test]
    fn test_saturating_add_clamps_instead_of_overflowing() {
        let now = Instant::now();
        assert_eq!(saturating_add(now, Duration::from_secs(3)) - now, Duration::from_secs(3));

        let far = saturating_add(now, Duration::MAX);
        assert!(far > now);
        assert!(far - now >= Duration::from_secs(365 * 24 * 60 * 60));
    }
}

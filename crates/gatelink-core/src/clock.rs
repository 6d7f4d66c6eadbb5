//! Decision timestamps.
//!
//! Decisions are stamped from a monotonic source anchored once to the wall
//! clock. Adjusting the system clock while the gateway runs (NTP step, manual
//! change) therefore never reorders or rewinds logged decisions.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Instant;

/// Wall-clock anchor plus monotonic elapsed time.
///
/// # Examples
///
/// ```
/// use gatelink_core::MonotonicClock;
///
/// let clock = MonotonicClock::new();
/// let first = clock.now();
/// let second = clock.now();
/// assert!(second >= first);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl MonotonicClock {
    /// Anchor a new clock at the current wall time.
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchor a clock at an explicit wall time.
    pub fn anchored_at(anchor_wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall,
            anchor: Instant::now(),
        }
    }

    /// Current timestamp.
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_wall
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clock_starts_at_anchor() {
        let anchor = Utc.with_ymd_and_hms(2024, 11, 20, 16, 33, 32).unwrap();
        let clock = MonotonicClock::anchored_at(anchor);

        let now = clock.now();
        assert!(now >= anchor);
        assert!(now - anchor < TimeDelta::seconds(5));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next >= last);
            last = next;
        }
    }
}

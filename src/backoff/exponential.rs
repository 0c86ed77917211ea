//! Deterministic and truncated exponential backoff.

use std::time::Duration;

use super::{from_nanos, Backoff, Intervals};
use crate::randomizer::{Rand, Randomizer};

/// Doubles the delay after every attempt, up to a maximum.
///
/// Delay = `min(max, base * 2^attempt)`
///
/// ```rust
/// use backoff_retrier::backoff::{Backoff, CappedExponential};
/// use std::time::Duration;
///
/// let backoff = CappedExponential::new(Duration::from_millis(500), Duration::from_millis(100));
///
/// assert_eq!(backoff.delay(0), Duration::from_millis(100));
/// assert_eq!(backoff.delay(1), Duration::from_millis(200));
/// assert_eq!(backoff.delay(2), Duration::from_millis(400));
/// assert_eq!(backoff.delay(3), Duration::from_millis(500)); // capped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CappedExponential {
    intervals: Intervals,
}

impl CappedExponential {
    /// Create a capped exponential backoff.
    ///
    /// Zero intervals fall back to the crate defaults.
    pub fn new(max_interval: Duration, base_interval: Duration) -> Self {
        Self {
            intervals: Intervals::new(max_interval, base_interval),
        }
    }
}

impl Default for CappedExponential {
    fn default() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl Backoff for CappedExponential {
    fn delay(&self, attempt: u32) -> Duration {
        match self.intervals.capped_exponential(attempt) {
            Some(nanos) => from_nanos(nanos),
            None => self.intervals.max_duration(),
        }
    }
}

/// Exponential backoff with a small random component bounded by the base.
///
/// Delay = `min(max, base * 2^attempt + random(base))`
///
/// Unlike [`FullJitter`](super::FullJitter), the randomness does not grow with
/// the attempt: the randomizer is always asked for a value below `base`.
#[derive(Debug)]
pub struct TruncatedExponential<R = Rand> {
    intervals: Intervals,
    rand: R,
}

impl<R: Randomizer> TruncatedExponential<R> {
    /// Create a truncated exponential backoff.
    ///
    /// Zero intervals fall back to the crate defaults.
    pub fn new(max_interval: Duration, base_interval: Duration, rand: R) -> Self {
        Self {
            intervals: Intervals::new(max_interval, base_interval),
            rand,
        }
    }
}

impl<R: Randomizer> Backoff for TruncatedExponential<R> {
    fn delay(&self, attempt: u32) -> Duration {
        let max = self.intervals.max_duration();
        if attempt >= 63 {
            return max;
        }

        let jitter = self.rand.next_below(self.intervals.base);
        let sum = self
            .intervals
            .exponential(attempt)
            .and_then(|exp| exp.checked_add(jitter));

        match sum {
            Some(total) if total > 0 && total != jitter => self.intervals.clamp(total),
            _ => max,
        }
    }
}

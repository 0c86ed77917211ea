//! Jittered backoff strategies.
//!
//! Jitter spreads retries from many callers over time so that they do not hit
//! a recovering service in lockstep. All three strategies draw whole
//! nanoseconds from their [`Randomizer`], so a deterministic randomizer gives
//! deterministic delays.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{from_nanos, Backoff, Intervals};
use crate::randomizer::{Rand, Randomizer};

/// Random delay anywhere below the capped exponential.
///
/// Delay = `random(min(max, base * 2^attempt))`
///
/// ```rust
/// use backoff_retrier::backoff::{Backoff, FullJitter};
/// use backoff_retrier::Rand;
/// use std::time::Duration;
///
/// let backoff = FullJitter::new(Duration::from_secs(1), Duration::from_millis(100), Rand::new(1));
/// assert!(backoff.delay(2) < Duration::from_millis(400));
/// ```
#[derive(Debug)]
pub struct FullJitter<R = Rand> {
    intervals: Intervals,
    rand: R,
}

impl<R: Randomizer> FullJitter<R> {
    /// Create a full-jitter backoff. Zero intervals fall back to the defaults.
    pub fn new(max_interval: Duration, base_interval: Duration, rand: R) -> Self {
        Self {
            intervals: Intervals::new(max_interval, base_interval),
            rand,
        }
    }
}

impl<R: Randomizer> Backoff for FullJitter<R> {
    fn delay(&self, attempt: u32) -> Duration {
        match self.intervals.capped_exponential(attempt) {
            Some(sleep) => self.intervals.clamp(self.rand.next_below(sleep)),
            None => self.intervals.max_duration(),
        }
    }
}

/// Keeps half of the capped exponential and jitters the other half.
///
/// Delay = `half + random(half)` where `half = min(max, base * 2^attempt) / 2`
#[derive(Debug)]
pub struct EqualJitter<R = Rand> {
    intervals: Intervals,
    rand: R,
}

impl<R: Randomizer> EqualJitter<R> {
    /// Create an equal-jitter backoff. Zero intervals fall back to the defaults.
    pub fn new(max_interval: Duration, base_interval: Duration, rand: R) -> Self {
        Self {
            intervals: Intervals::new(max_interval, base_interval),
            rand,
        }
    }
}

impl<R: Randomizer> Backoff for EqualJitter<R> {
    fn delay(&self, attempt: u32) -> Duration {
        let Some(sleep) = self.intervals.capped_exponential(attempt) else {
            return self.intervals.max_duration();
        };

        let half = sleep / 2;
        if half == 0 {
            return Duration::ZERO;
        }

        match half.checked_add(self.rand.next_below(half)) {
            Some(total) => self.intervals.clamp(total),
            None => self.intervals.max_duration(),
        }
    }
}

/// Decorrelated jitter: each delay is drawn relative to the previous one.
///
/// Delay = `min(max, random in [base, 3 * previous))`, with `previous`
/// starting at `base`. The attempt index is ignored.
///
/// # State
///
/// The previous delay lives inside the strategy behind a mutex, so an instance
/// can be shared between threads safely. It is *not* reset between retry
/// sequences: a [`Retrier`](crate::Retrier) reused for unrelated calls keeps
/// growing from wherever the last call left off. Give each logical sequence
/// its own instance, or call [`reset`](Self::reset), when that is not wanted.
///
/// ```rust
/// use backoff_retrier::backoff::{Backoff, Decorrelated};
/// use backoff_retrier::Rand;
/// use std::time::Duration;
///
/// let backoff = Decorrelated::new(
///     Duration::from_secs(1),
///     Duration::from_millis(100),
///     Rand::new(9),
/// );
///
/// let first = backoff.delay(0);
/// assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(300));
/// assert_eq!(backoff.previous(), first);
///
/// backoff.reset();
/// assert_eq!(backoff.previous(), Duration::from_millis(100));
/// ```
#[derive(Debug)]
pub struct Decorrelated<R = Rand> {
    intervals: Intervals,
    prev_sleep: Mutex<i64>,
    rand: R,
}

impl<R: Randomizer> Decorrelated<R> {
    /// Create a decorrelated backoff. Zero intervals fall back to the defaults.
    pub fn new(max_interval: Duration, base_interval: Duration, rand: R) -> Self {
        let intervals = Intervals::new(max_interval, base_interval);
        Self {
            prev_sleep: Mutex::new(intervals.base),
            intervals,
            rand,
        }
    }

    /// The delay most recently returned, or the base interval before the
    /// first call.
    pub fn previous(&self) -> Duration {
        from_nanos(*self.lock())
    }

    /// Forget previous delays and start again from the base interval.
    pub fn reset(&self) {
        *self.lock() = self.intervals.base;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, i64> {
        // An i64 cannot be left half-written by a panic.
        self.prev_sleep.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Randomizer> Backoff for Decorrelated<R> {
    fn delay(&self, _attempt: u32) -> Duration {
        let base = self.intervals.base;
        let mut prev = self.lock();

        let Some(upper) = prev.checked_mul(3) else {
            #[cfg(feature = "tracing")]
            tracing::trace!(prev_ns = *prev, "decorrelated backoff saturated");
            return self.intervals.max_duration();
        };

        let span = upper - base;
        let next = if span > 0 {
            match self.rand.next_below(span).checked_add(base) {
                Some(next) => next,
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(prev_ns = *prev, "decorrelated backoff saturated");
                    return self.intervals.max_duration();
                }
            }
        } else {
            base
        };

        *prev = next.min(self.intervals.max);
        from_nanos(*prev)
    }
}

//! Backoff strategies: how long to wait before the next attempt.
//!
//! Every strategy implements [`Backoff`], a single method mapping a zero-based
//! attempt index to a [`Duration`]. Strategies are plain values configured at
//! construction; apart from [`Decorrelated`] none of them carries state.
//!
//! # Strategies
//!
//! - [`Constant`]: always the base interval
//! - [`CappedExponential`]: `min(max, base * 2^attempt)`
//! - [`FullJitter`]: random in `[0, min(max, base * 2^attempt))`
//! - [`EqualJitter`]: half of the capped exponential, plus a random half
//! - [`TruncatedExponential`]: `min(max, base * 2^attempt + random(base))`
//! - [`Decorrelated`]: random in `[base, 3 * previous)`, capped at `max`
//!
//! # Overflow
//!
//! Arithmetic is carried out on signed 64-bit nanosecond counts. Once the
//! exponential term no longer fits (any attempt `>= 63`, or a product that
//! overflows), the exponential family returns the maximum interval directly
//! and does not consult its randomizer.
//!
//! ```rust
//! use backoff_retrier::backoff::{Backoff, CappedExponential};
//! use std::time::Duration;
//!
//! let backoff = CappedExponential::new(Duration::from_secs(1), Duration::from_millis(100));
//!
//! assert_eq!(backoff.delay(0), Duration::from_millis(100));
//! assert_eq!(backoff.delay(3), Duration::from_millis(800));
//! assert_eq!(backoff.delay(4), Duration::from_secs(1));
//! assert_eq!(backoff.delay(200), Duration::from_secs(1));
//! ```

mod exponential;
mod jitter;

use std::sync::Arc;
use std::time::Duration;

pub use exponential::{CappedExponential, TruncatedExponential};
pub use jitter::{Decorrelated, EqualJitter, FullJitter};

/// Base interval used when a strategy is constructed with a zero base.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum interval used when a strategy is constructed with a zero maximum.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(1000);

/// A backoff strategy.
///
/// `attempt` is the zero-based index of the attempt that just failed; the
/// returned duration is how long to wait before the next one.
///
/// Implementations must be shareable across threads. Stateful strategies are
/// responsible for their own synchronization.
///
/// # Examples
///
/// A custom strategy that grows linearly:
///
/// ```rust
/// use backoff_retrier::backoff::Backoff;
/// use std::time::Duration;
///
/// struct Linear(Duration);
///
/// impl Backoff for Linear {
///     fn delay(&self, attempt: u32) -> Duration {
///         self.0.saturating_mul(attempt + 1)
///     }
/// }
///
/// assert_eq!(Linear(Duration::from_millis(10)).delay(2), Duration::from_millis(30));
/// ```
pub trait Backoff: Send + Sync {
    /// Delay to wait after the given failed attempt.
    fn delay(&self, attempt: u32) -> Duration;
}

impl<B: Backoff + ?Sized> Backoff for &B {
    fn delay(&self, attempt: u32) -> Duration {
        (**self).delay(attempt)
    }
}

impl<B: Backoff + ?Sized> Backoff for Arc<B> {
    fn delay(&self, attempt: u32) -> Duration {
        (**self).delay(attempt)
    }
}

impl<B: Backoff + ?Sized> Backoff for Box<B> {
    fn delay(&self, attempt: u32) -> Duration {
        (**self).delay(attempt)
    }
}

/// Waits the same interval after every attempt.
///
/// ```rust
/// use backoff_retrier::backoff::{Backoff, Constant};
/// use std::time::Duration;
///
/// let backoff = Constant::new(Duration::from_millis(250));
/// assert_eq!(backoff.delay(0), Duration::from_millis(250));
/// assert_eq!(backoff.delay(9), Duration::from_millis(250));
///
/// // Zero falls back to the default base interval.
/// assert_eq!(Constant::new(Duration::ZERO).delay(0), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant {
    base_interval: Duration,
}

impl Constant {
    /// Create a constant backoff. A zero interval means [`DEFAULT_BASE_INTERVAL`].
    pub fn new(base_interval: Duration) -> Self {
        Self {
            base_interval: or_default(base_interval, DEFAULT_BASE_INTERVAL),
        }
    }

    /// The interval returned for every attempt.
    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }
}

impl Default for Constant {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_INTERVAL)
    }
}

impl Backoff for Constant {
    fn delay(&self, _attempt: u32) -> Duration {
        self.base_interval
    }
}

/// Base and maximum interval shared by the exponential family, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Intervals {
    pub(crate) base: i64,
    pub(crate) max: i64,
}

impl Intervals {
    pub(crate) fn new(max_interval: Duration, base_interval: Duration) -> Self {
        Self {
            base: to_nanos(or_default(base_interval, DEFAULT_BASE_INTERVAL)),
            max: to_nanos(or_default(max_interval, DEFAULT_MAX_INTERVAL)),
        }
    }

    pub(crate) fn max_duration(&self) -> Duration {
        from_nanos(self.max)
    }

    /// `base * 2^attempt`, or `None` once the product no longer fits.
    pub(crate) fn exponential(&self, attempt: u32) -> Option<i64> {
        // 1 << 63 is i64::MIN, so the factor itself has already wrapped.
        if attempt >= 63 {
            return None;
        }
        let factor = 1i64 << attempt;
        self.base.checked_mul(factor).filter(|n| *n > 0)
    }

    /// `min(max, base * 2^attempt)`, or `None` when the exponential saturates.
    pub(crate) fn capped_exponential(&self, attempt: u32) -> Option<i64> {
        self.exponential(attempt).map(|n| n.min(self.max))
    }

    /// Clamp a computed value into `[0, max]` and convert it.
    pub(crate) fn clamp(&self, nanos: i64) -> Duration {
        from_nanos(nanos.clamp(0, self.max))
    }
}

fn or_default(interval: Duration, default: Duration) -> Duration {
    if interval.is_zero() {
        default
    } else {
        interval
    }
}

/// Durations past `i64::MAX` nanoseconds (~292 years) saturate.
pub(crate) fn to_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

pub(crate) fn from_nanos(nanos: i64) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))
}

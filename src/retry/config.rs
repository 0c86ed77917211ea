//! Declarative retry configuration.
//!
//! [`RetryConfig`] describes a [`Retrier`] as plain data, suitable for loading
//! from a settings file. Enable the `serde` feature to (de)serialize it:
//!
//! ```json
//! {
//!   "max_retry_attempts": 5,
//!   "backoff": { "strategy": "full_jitter", "base_interval_ms": 50, "max_interval_ms": 2000 }
//! }
//! ```
//!
//! Interval fields left out, or set to 0, fall back to the backoff defaults.

use std::sync::Arc;
use std::time::Duration;

use super::retrier::{Retrier, DEFAULT_MAX_RETRY_ATTEMPTS};
use crate::backoff::{
    Backoff, CappedExponential, Constant, Decorrelated, EqualJitter, FullJitter,
    TruncatedExponential,
};
use crate::randomizer::{Rand, Randomizer};

/// Configuration for a [`Retrier`].
///
/// # Examples
///
/// ```rust
/// use backoff_retrier::{BackoffConfig, Retrier, RetryConfig};
///
/// let config = RetryConfig {
///     max_retry_attempts: 3,
///     backoff: BackoffConfig::CappedExponential {
///         base_interval_ms: 10,
///         max_interval_ms: 500,
///     },
/// };
///
/// let retrier = Retrier::from_config(&config);
/// assert_eq!(retrier.max_retry_attempts(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retry_attempts: u32,
    /// Backoff strategy between attempts.
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Which backoff strategy to build, and with which intervals.
///
/// Intervals are in milliseconds; 0 selects the default.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "strategy", rename_all = "snake_case"))]
pub enum BackoffConfig {
    /// See [`Constant`].
    Constant {
        /// Base interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        base_interval_ms: u64,
    },
    /// See [`CappedExponential`].
    CappedExponential {
        /// Base interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        base_interval_ms: u64,
        /// Maximum interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        max_interval_ms: u64,
    },
    /// See [`FullJitter`].
    FullJitter {
        /// Base interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        base_interval_ms: u64,
        /// Maximum interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        max_interval_ms: u64,
    },
    /// See [`EqualJitter`].
    EqualJitter {
        /// Base interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        base_interval_ms: u64,
        /// Maximum interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        max_interval_ms: u64,
    },
    /// See [`TruncatedExponential`].
    TruncatedExponential {
        /// Base interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        base_interval_ms: u64,
        /// Maximum interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        max_interval_ms: u64,
    },
    /// See [`Decorrelated`].
    Decorrelated {
        /// Base interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        base_interval_ms: u64,
        /// Maximum interval in milliseconds.
        #[cfg_attr(feature = "serde", serde(default))]
        max_interval_ms: u64,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::Constant {
            base_interval_ms: 0,
        }
    }
}

impl BackoffConfig {
    /// Build the strategy, drawing jitter from a freshly seeded [`Rand`].
    pub fn build(&self) -> Arc<dyn Backoff> {
        self.build_with(Rand::from_entropy())
    }

    /// Build the strategy, drawing jitter from `rand`.
    ///
    /// `rand` is dropped unused for the deterministic strategies.
    ///
    /// ```rust
    /// use backoff_retrier::backoff::Backoff;
    /// use backoff_retrier::{BackoffConfig, Rand};
    /// use std::time::Duration;
    ///
    /// let backoff = BackoffConfig::FullJitter { base_interval_ms: 10, max_interval_ms: 100 }
    ///     .build_with(Rand::new(3));
    /// assert!(backoff.delay(1) < Duration::from_millis(20));
    /// ```
    pub fn build_with<R: Randomizer + 'static>(&self, rand: R) -> Arc<dyn Backoff> {
        match *self {
            Self::Constant { base_interval_ms } => Arc::new(Constant::new(ms(base_interval_ms))),
            Self::CappedExponential {
                base_interval_ms,
                max_interval_ms,
            } => Arc::new(CappedExponential::new(
                ms(max_interval_ms),
                ms(base_interval_ms),
            )),
            Self::FullJitter {
                base_interval_ms,
                max_interval_ms,
            } => Arc::new(FullJitter::new(
                ms(max_interval_ms),
                ms(base_interval_ms),
                rand,
            )),
            Self::EqualJitter {
                base_interval_ms,
                max_interval_ms,
            } => Arc::new(EqualJitter::new(
                ms(max_interval_ms),
                ms(base_interval_ms),
                rand,
            )),
            Self::TruncatedExponential {
                base_interval_ms,
                max_interval_ms,
            } => Arc::new(TruncatedExponential::new(
                ms(max_interval_ms),
                ms(base_interval_ms),
                rand,
            )),
            Self::Decorrelated {
                base_interval_ms,
                max_interval_ms,
            } => Arc::new(Decorrelated::new(
                ms(max_interval_ms),
                ms(base_interval_ms),
                rand,
            )),
        }
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

impl Retrier {
    /// Build a retrier from declarative configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Retrier::new()
            .with_max_retry_attempts(config.max_retry_attempts)
            .with_shared_backoff(config.backoff.build())
    }
}

impl From<RetryConfig> for Retrier {
    fn from(config: RetryConfig) -> Self {
        Retrier::from_config(&config)
    }
}

//! Test doubles and assertion macros for code that retries.
//!
//! Jittered strategies are only testable when the randomness is under control.
//! [`ScriptedRandomizer`] replays a fixed list of values and records every
//! bound it was asked for; [`RecordingBackoff`] returns a fixed delay and
//! records every attempt index it saw.
//!
//! # Examples
//!
//! ```rust
//! use backoff_retrier::backoff::{Backoff, FullJitter};
//! use backoff_retrier::testing::ScriptedRandomizer;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let rand = Arc::new(ScriptedRandomizer::new([250]));
//! let backoff = FullJitter::new(
//!     Duration::from_secs(1),
//!     Duration::from_micros(1),
//!     Arc::clone(&rand),
//! );
//!
//! assert_eq!(backoff.delay(0), Duration::from_nanos(250));
//! assert_eq!(rand.bounds(), vec![1_000]);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::backoff::Backoff;
use crate::randomizer::Randomizer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replays a scripted sequence of values.
///
/// Values are returned as given, even when they are not below the requested
/// bound, so overflow handling can be exercised.
///
/// # Panics
///
/// Panics when asked for more values than were scripted.
#[derive(Debug, Default)]
pub struct ScriptedRandomizer {
    values: Mutex<VecDeque<i64>>,
    bounds: Mutex<Vec<i64>>,
}

impl ScriptedRandomizer {
    /// Create a randomizer that returns `values` in order.
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            bounds: Mutex::new(Vec::new()),
        }
    }

    /// Every bound requested so far, in call order.
    pub fn bounds(&self) -> Vec<i64> {
        lock(&self.bounds).clone()
    }

    /// Number of scripted values not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.values).len()
    }
}

impl Randomizer for ScriptedRandomizer {
    fn next_below(&self, bound: i64) -> i64 {
        lock(&self.bounds).push(bound);
        match lock(&self.values).pop_front() {
            Some(value) => value,
            None => panic!("ScriptedRandomizer exhausted (bound {bound})"),
        }
    }
}

/// Always returns the same value, clamped below the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRandomizer(pub i64);

impl Randomizer for FixedRandomizer {
    fn next_below(&self, bound: i64) -> i64 {
        self.0.clamp(0, bound - 1)
    }
}

/// Returns a fixed delay and records the attempt index of every call.
///
/// ```rust
/// use backoff_retrier::backoff::Backoff;
/// use backoff_retrier::testing::RecordingBackoff;
/// use std::time::Duration;
///
/// let backoff = RecordingBackoff::new(Duration::from_millis(1));
/// backoff.delay(0);
/// backoff.delay(1);
/// assert_eq!(backoff.attempts(), vec![0, 1]);
/// ```
#[derive(Debug)]
pub struct RecordingBackoff {
    delay: Duration,
    attempts: Mutex<Vec<u32>>,
}

impl RecordingBackoff {
    /// Create a backoff that always waits `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Attempt indices seen so far, in call order.
    pub fn attempts(&self) -> Vec<u32> {
        lock(&self.attempts).clone()
    }

    /// Number of times the backoff was consulted.
    pub fn calls(&self) -> usize {
        lock(&self.attempts).len()
    }
}

impl Backoff for RecordingBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        lock(&self.attempts).push(attempt);
        self.delay
    }
}

/// Assert that a retry result ended in cancellation.
///
/// Evaluates to the operation error that was pending when cancellation fired.
///
/// ```rust
/// use backoff_retrier::{assert_cancelled, CancelledError, RetryError};
///
/// let result: Result<(), RetryError<std::fmt::Error>> =
///     Err(RetryError::Cancelled(CancelledError::new(std::fmt::Error)));
/// let cause = assert_cancelled!(result);
/// assert_eq!(cause, std::fmt::Error);
/// ```
#[macro_export]
macro_rules! assert_cancelled {
    ($result:expr) => {
        match $result {
            Err($crate::RetryError::Cancelled(cancelled)) => cancelled.into_cause(),
            Err($crate::RetryError::Operation(e)) => {
                panic!("Expected Cancelled, got Operation error: {:?}", e);
            }
            Ok(v) => {
                panic!("Expected Cancelled, got Ok: {:?}", v);
            }
        }
    };
}

/// Assert that a retry result ended with the operation error itself.
///
/// The one-argument form evaluates to the error; the two-argument form also
/// compares it against an expected value.
///
/// ```rust
/// use backoff_retrier::{assert_operation_error, RetryError};
///
/// let result: Result<(), RetryError<std::fmt::Error>> =
///     Err(RetryError::Operation(std::fmt::Error));
/// assert_operation_error!(result, std::fmt::Error);
/// ```
#[macro_export]
macro_rules! assert_operation_error {
    ($result:expr) => {
        match $result {
            Err($crate::RetryError::Operation(e)) => e,
            Err($crate::RetryError::Cancelled(c)) => {
                panic!("Expected Operation error, got Cancelled: {:?}", c);
            }
            Ok(v) => {
                panic!("Expected Operation error, got Ok: {:?}", v);
            }
        }
    };
    ($result:expr, $expected:expr) => {
        assert_eq!($crate::assert_operation_error!($result), $expected)
    };
}

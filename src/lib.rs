//! # backoff-retrier
//!
//! Run a fallible async operation again until it succeeds, with a bounded
//! number of retries, a pluggable backoff between attempts, and cooperative
//! cancellation.
//!
//! ## Quick Example
//!
//! ```rust
//! use backoff_retrier::backoff::FullJitter;
//! use backoff_retrier::{Rand, Retrier};
//! use std::io;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let retrier = Retrier::new()
//!     .with_max_retry_attempts(5)
//!     .with_backoff(FullJitter::new(
//!         Duration::from_millis(50),
//!         Duration::from_millis(1),
//!         Rand::default(),
//!     ));
//!
//! let attempts = &AtomicU32::new(0);
//! let body = retrier
//!     .run(move || async move {
//!         match attempts.fetch_add(1, Ordering::SeqCst) {
//!             0 | 1 => Err(io::Error::other("503 service unavailable")),
//!             _ => Ok("payload"),
//!         }
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(body, "payload");
//! # });
//! ```
//!
//! ## Stopping early
//!
//! - Wrap a failure with [`unretryable`] to end the loop on the spot. An
//!   operation that fails with a [`BoxError`] can mix both kinds of failure;
//!   run it with [`Retrier::run_boxed`].
//! - Pass any `Future<Output = ()>` to [`Retrier::run_with_cancel`]; if it
//!   completes while the loop is waiting, the loop returns
//!   [`RetryError::Cancelled`] holding the pending error.
//!
//! ## Feature flags
//!
//! - `tracing`: emit `tracing` events for retries, exhaustion and cancellation
//! - `serde`: (de)serialize [`RetryConfig`] and [`BackoffConfig`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backoff;
pub mod randomizer;
pub mod retry;
pub mod testing;

// Re-exports
pub use backoff::Backoff;
pub use randomizer::{Rand, Randomizer};
pub use retry::{
    chain, chain_contains, find_in_chain, is_in_chain, is_unretryable, retry, retry_with_cancel,
    retry_with_cancel_and_options, retry_with_options, unretryable, BackoffConfig, BoxError,
    CancelledError, Chain, Retrier, RetryConfig, RetryError, RetryEvent, UnretryableError,
    DEFAULT_MAX_RETRY_ATTEMPTS,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backoff::{
        Backoff, CappedExponential, Constant, Decorrelated, EqualJitter, FullJitter,
        TruncatedExponential,
    };
    pub use crate::randomizer::{Rand, Randomizer};
    pub use crate::retry::{
        retry, retry_with_cancel, retry_with_cancel_and_options, retry_with_options, unretryable,
        BoxError, CancelledError, Retrier, RetryError, UnretryableError,
    };
}

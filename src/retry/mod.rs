//! Retry loop, error taxonomy and configuration.
//!
//! # Quick Start
//!
//! ```rust
//! use backoff_retrier::backoff::CappedExponential;
//! use backoff_retrier::Retrier;
//! use std::io;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let retrier = Retrier::new()
//!     .with_max_retry_attempts(3)
//!     .with_backoff(CappedExponential::new(Duration::from_millis(20), Duration::from_millis(1)));
//!
//! let result = retrier
//!     .run(|| async { Err::<(), _>(io::Error::other("connection reset")) })
//!     .await;
//!
//! // Budget spent: the last operation error comes back unchanged.
//! let err = result.unwrap_err();
//! assert!(err.is_operation());
//! assert_eq!(err.to_string(), "connection reset");
//! # });
//! ```
//!
//! # How a run ends
//!
//! - **Success**: the operation's value
//! - **Exhausted**: [`RetryError::Operation`] with the last error
//! - **Unretryable**: [`RetryError::Operation`] with an error whose chain holds
//!   an [`UnretryableError`], returned right after the first such failure
//! - **Cancelled**: [`RetryError::Cancelled`], wrapping the error that was
//!   about to be retried
//!
//! Errors from intermediate attempts are dropped.

mod config;
mod error;
mod retrier;

pub use config::{BackoffConfig, RetryConfig};
pub use error::{
    chain, chain_contains, find_in_chain, is_in_chain, is_unretryable, unretryable, BoxError,
    CancelledError, Chain, RetryError, UnretryableError,
};
pub use retrier::{
    retry, retry_with_cancel, retry_with_cancel_and_options, retry_with_options, Retrier,
    RetryEvent, DEFAULT_MAX_RETRY_ATTEMPTS,
};

#[cfg(test)]
mod tests;

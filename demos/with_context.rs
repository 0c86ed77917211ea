//! Cancelling a retry loop with a deadline
//!
//! The deadline fires while the loop waits between attempts, so the result is
//! a cancellation that still carries the operation's own error.
//!
//! Run with: cargo run --example with_context

use std::fmt;
use std::process;
use std::time::Duration;

use backoff_retrier::{chain_contains, Retrier, RetryError};

#[derive(Debug, PartialEq)]
struct DummyError;

impl fmt::Display for DummyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dummy error")
    }
}

impl std::error::Error for DummyError {}

async fn dummy_operation() -> Result<(), DummyError> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    Err(DummyError)
}

#[tokio::main]
async fn main() {
    let deadline = tokio::time::sleep(Duration::from_millis(1));

    let result = Retrier::new().run_with_cancel(deadline, dummy_operation).await;

    if let Err(err) = result {
        eprintln!("could not do dummy_operation: {err}");

        if let RetryError::Cancelled(_) = &err {
            eprintln!("error is a cancellation");
        }

        if chain_contains(&err, &DummyError) {
            eprintln!("error is dummy error");
        }

        process::exit(1);
    }
}

//! Plugging in a custom backoff strategy
//!
//! Anything implementing [`Backoff`] can drive the wait between attempts.
//!
//! Run with: cargo run --example with_custom_backoff

use std::io;
use std::process;
use std::time::Duration;

use backoff_retrier::backoff::Backoff;
use backoff_retrier::retry_with_options;

/// Waits one millisecond, then two, then three...
#[derive(Debug)]
struct LinearBackoff {
    step: Duration,
}

impl Backoff for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt.saturating_add(1))
    }
}

async fn dummy_operation() -> Result<(), io::Error> {
    tokio::time::sleep(Duration::from_millis(100)).await;
    Err(io::Error::other("dummy error"))
}

#[tokio::main]
async fn main() {
    let result = retry_with_options(
        |r| {
            r.with_max_retry_attempts(1).with_backoff(LinearBackoff {
                step: Duration::from_millis(1),
            })
        },
        dummy_operation,
    )
    .await;

    if let Err(err) = result {
        eprintln!("could not do dummy_operation: {err}");
        process::exit(1);
    }
}

//! Watching the retry loop through `tracing`
//!
//! Run with: cargo run --example tracing_demo --features tracing

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff_retrier::backoff::EqualJitter;
use backoff_retrier::{unretryable, Rand, Retrier};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let retrier = Retrier::new()
        .with_max_retry_attempts(4)
        .with_backoff(EqualJitter::new(
            Duration::from_millis(200),
            Duration::from_millis(10),
            Rand::from_entropy(),
        ));

    tracing::info!("flaky operation, succeeds on the third attempt");
    let calls = &AtomicU32::new(0);
    let result = retrier
        .run(move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(io::Error::other("connection reset"))
            } else {
                Ok(42)
            }
        })
        .await;
    tracing::info!(?result, "finished");

    tracing::info!("operation that never succeeds");
    let result = retrier
        .run(|| async { Err::<(), _>(io::Error::other("service unavailable")) })
        .await;
    tracing::info!(error = %result.unwrap_err(), "gave up");

    tracing::info!("operation rejected outright");
    let result = retrier
        .run(|| async { Err::<(), _>(unretryable("invalid api key")) })
        .await;
    tracing::info!(error = %result.unwrap_err(), "gave up");

    tracing::info!("cancelled by a deadline");
    let result = retrier
        .run_with_cancel(tokio::time::sleep(Duration::from_millis(15)), || async {
            Err::<(), _>(io::Error::other("timeout"))
        })
        .await;
    tracing::info!(error = %result.unwrap_err(), "gave up");
}

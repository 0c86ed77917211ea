//! One configured retrier shared by several concurrent tasks
//!
//! Run with: cargo run --example with_initialization

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use backoff_retrier::backoff::TruncatedExponential;
use backoff_retrier::{Rand, Retrier};

async fn dummy_operation(work: Duration) -> Result<(), io::Error> {
    tokio::time::sleep(work).await;
    Err(io::Error::other("dummy error"))
}

#[tokio::main]
async fn main() {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();

    let retrier = Retrier::new()
        .with_max_retry_attempts(1)
        .with_backoff(TruncatedExponential::new(
            Duration::from_secs(1),
            Duration::from_millis(1),
            Rand::new(seed),
        ));

    let tasks: Vec<_> = [1, 2, 3]
        .into_iter()
        .map(|secs| {
            let retrier = retrier.clone();
            tokio::spawn(async move {
                retrier
                    .run(|| dummy_operation(Duration::from_millis(100 * secs)))
                    .await
            })
        })
        .collect();

    println!("waiting");

    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => eprintln!("got error: {err}"),
            Err(join_err) => eprintln!("task failed: {join_err}"),
        }
    }
}

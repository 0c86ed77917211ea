//! Stopping the loop early with an unretryable error
//!
//! A 400 response will not get better by asking again, so the operation marks
//! it unretryable and the retrier returns after the first attempt.
//!
//! Run with: cargo run --example with_unretryable

use std::process;

use backoff_retrier::{retry, unretryable, UnretryableError};

/// Stand-in for an HTTP server that rejects every request.
async fn fetch_status() -> u16 {
    400
}

async fn get_data() -> Result<String, UnretryableError> {
    if fetch_status().await == 400 {
        return Err(unretryable("error bad request"));
    }
    Ok("body".to_string())
}

#[tokio::main]
async fn main() {
    if let Err(err) = retry(get_data).await {
        eprintln!("got err {err}");

        if err.is_unretryable() {
            eprintln!("error is unretryable");
        }

        process::exit(1);
    }
}

//! Tests for the retry loop.

use super::*;
use crate::backoff::{Constant, Decorrelated};
use crate::testing::{RecordingBackoff, ScriptedRandomizer};
use crate::{assert_cancelled, assert_operation_error};
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
struct OpError(u32);

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt {} failed", self.0)
    }
}

impl StdError for OpError {}

/// An application error that may wrap the unretryable marker.
#[derive(Debug)]
enum AppError {
    Transient,
    Fatal(UnretryableError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Fatal(e) => write!(f, "fatal: {}", e),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transient => None,
            Self::Fatal(e) => Some(e),
        }
    }
}

fn retrier_with(backoff: &Arc<RecordingBackoff>, max: u32) -> Retrier {
    Retrier::new()
        .with_max_retry_attempts(max)
        .with_shared_backoff(Arc::clone(backoff) as Arc<dyn crate::backoff::Backoff>)
}

#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt_skips_backoff() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));
    let result = retrier_with(&backoff, 3)
        .run(|| async { Ok::<_, OpError>(42) })
        .await;

    assert_eq!(result, Ok(42));
    assert_eq!(backoff.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_third_attempt() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));
    let calls = Arc::new(AtomicU32::new(0));

    let result = retrier_with(&backoff, 5)
        .run({
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(OpError(n))
                    } else {
                        Ok("success")
                    }
                }
            }
        })
        .await;

    assert_eq!(result, Ok("success"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(backoff.attempts(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_last_error_unchanged() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));
    let calls = Arc::new(AtomicU32::new(0));

    let result = retrier_with(&backoff, 3)
        .run({
            let calls = Arc::clone(&calls);
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(OpError(n)) }
            }
        })
        .await;

    assert_operation_error!(result, OpError(3));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(backoff.attempts(), vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_means_one_try() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));
    let calls = AtomicU32::new(0);

    let result = retrier_with(&backoff, 0)
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(OpError(0)) }
        })
        .await;

    assert_operation_error!(result, OpError(0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(backoff.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unretryable_stops_immediately() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));
    let calls = AtomicU32::new(0);

    let result = retrier_with(&backoff, 5)
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(unretryable(OpError(7))) }
        })
        .await;

    let err = assert_operation_error!(result);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(backoff.calls(), 0);
    assert!(chain_contains(&err, &OpError(7)));
    assert_eq!(err.to_string(), "unretryable error: attempt 7 failed");
}

#[tokio::test(start_paused = true)]
async fn test_unretryable_detected_inside_application_error() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));
    let calls = AtomicU32::new(0);

    let result = retrier_with(&backoff, 5)
        .run(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err::<(), _>(AppError::Transient)
                } else {
                    Err(AppError::Fatal(unretryable("invalid token")))
                }
            }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_unretryable());
    assert!(matches!(err.inner(), AppError::Fatal(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(backoff.attempts(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_waits_backoff_between_attempts() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(100)));
    let start = Instant::now();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _ = retrier_with(&backoff, 3)
        .run({
            let seen = Arc::clone(&seen);
            move || {
                seen.lock().unwrap().push(start.elapsed().as_millis());
                async { Err::<(), _>(OpError(0)) }
            }
        })
        .await;

    assert_eq!(*seen.lock().unwrap(), vec![0, 100, 200, 300]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_timer_returns_cancelled_error() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_secs(10)));
    let calls = AtomicU32::new(0);

    let result = retrier_with(&backoff, 5)
        .run_with_cancel(tokio::time::sleep(Duration::from_millis(50)), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(OpError(n)) }
        })
        .await;

    let cause = assert_cancelled!(result);
    assert_eq!(cause, OpError(0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(backoff.attempts(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_some_attempts_wraps_latest_error() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(100)));
    let calls = AtomicU32::new(0);

    let result = retrier_with(&backoff, 10)
        .run_with_cancel(tokio::time::sleep(Duration::from_millis(250)), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(OpError(n)) }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.inner(), &OpError(2));
    assert!(chain_contains(&err, &OpError(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_not_checked_during_operation() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));

    // The signal fires while the first attempt is still running; the
    // successful result still wins.
    let result = retrier_with(&backoff, 3)
        .run_with_cancel(tokio::time::sleep(Duration::from_millis(1)), || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, OpError>("slow but fine")
        })
        .await;

    assert_eq!(result, Ok("slow but fine"));
}

#[tokio::test(start_paused = true)]
async fn test_already_fired_signal_still_runs_first_attempt() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::ZERO));
    let calls = AtomicU32::new(0);

    let result = retrier_with(&backoff, 3)
        .run_with_cancel(std::future::ready(()), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(OpError(0)) }
        })
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_with_oneshot_channel() {
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let retrier = Retrier::new().with_backoff(Constant::new(Duration::from_secs(60)));

    let handle = tokio::spawn(async move {
        retrier
            .run_with_cancel(
                async {
                    let _ = rx.await;
                },
                || async { Err::<(), _>(OpError(1)) },
            )
            .await
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    tx.send(()).unwrap();

    let result = handle.await.unwrap();
    assert_eq!(assert_cancelled!(result), OpError(1));
}

#[tokio::test(start_paused = true)]
async fn test_hook_sees_each_retry_boundary() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let retrier = Retrier::new()
        .with_max_retry_attempts(2)
        .with_backoff(Constant::new(Duration::from_millis(5)))
        .with_on_retry({
            let events = Arc::clone(&events);
            move |event: &RetryEvent<'_>| {
                events
                    .lock()
                    .unwrap()
                    .push((
                        event.attempt,
                        event.delay,
                        event.error.to_string(),
                        event.elapsed.as_millis(),
                    ));
            }
        });

    let _ = retrier
        .run(|| async { Err::<(), _>(OpError(9)) })
        .await;

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            (0, Duration::from_millis(5), "attempt 9 failed".to_string(), 0),
            (1, Duration::from_millis(5), "attempt 9 failed".to_string(), 5),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_free_functions_use_defaults() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = retry(|| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>(OpError(0)) }
    })
    .await;

    assert!(result.unwrap_err().is_operation());
    assert_eq!(calls.load(Ordering::SeqCst), 11);
    assert_eq!(start.elapsed().as_millis(), 1000);

    let result = retry_with_cancel(tokio::time::sleep(Duration::from_millis(150)), || async {
        Err::<(), _>(OpError(0))
    })
    .await;
    assert!(result.unwrap_err().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_free_functions_take_options() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(7)));
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = retry_with_options(
        |r| {
            r.with_max_retry_attempts(2)
                .with_shared_backoff(Arc::clone(&backoff) as Arc<dyn crate::backoff::Backoff>)
        },
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(OpError(0)) }
        },
    )
    .await;

    assert!(result.unwrap_err().is_operation());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(backoff.attempts(), vec![0, 1]);
    assert_eq!(start.elapsed().as_millis(), 14);
}

#[tokio::test(start_paused = true)]
async fn test_free_function_with_cancel_takes_options() {
    let calls = AtomicU32::new(0);

    let result = retry_with_cancel_and_options(
        tokio::time::sleep(Duration::from_millis(25)),
        |r| r.with_backoff(Constant::new(Duration::from_millis(10))),
        || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(OpError(n)) }
        },
    )
    .await;

    // Attempts at 0, 10 and 20ms; the signal fires during the third wait.
    assert_eq!(assert_cancelled!(result), OpError(2));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_boxed_errors_mix_transient_and_unretryable() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));
    let calls = AtomicU32::new(0);

    let result = retrier_with(&backoff, 5)
        .run_boxed(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err::<(), _>(std::io::Error::other("connection reset"))?;
                }
                Err::<(), BoxError>(unretryable(OpError(n)).into())
            }
        })
        .await;

    let err = assert_operation_error!(result);
    assert!(is_unretryable(&*err));
    assert!(chain_contains(&*err, &OpError(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(backoff.attempts(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_boxed_errors_exhaust_and_cancel() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));

    let result = retrier_with(&backoff, 2)
        .run_boxed(|| async { Err::<(), BoxError>("503 service unavailable".into()) })
        .await;
    let err = assert_operation_error!(result);
    assert_eq!(err.to_string(), "503 service unavailable");
    assert!(!is_unretryable(&*err));
    assert_eq!(backoff.attempts(), vec![0, 1]);

    let result = retrier_with(&backoff, 5)
        .run_boxed_with_cancel(std::future::ready(()), || async {
            Err::<(), BoxError>(Box::new(OpError(9)))
        })
        .await;
    let cause = assert_cancelled!(result);
    assert_eq!(cause.downcast_ref::<OpError>(), Some(&OpError(9)));
}

#[tokio::test(start_paused = true)]
async fn test_decorrelated_state_carries_across_runs() {
    let rand = Arc::new(ScriptedRandomizer::new([1_000_000, 1_000_000, 0]));
    let backoff = Arc::new(Decorrelated::new(
        Duration::from_secs(1),
        Duration::from_millis(1),
        Arc::clone(&rand),
    ));
    let retrier = Retrier::new()
        .with_max_retry_attempts(1)
        .with_shared_backoff(Arc::clone(&backoff) as Arc<dyn crate::backoff::Backoff>);

    let _ = retrier.run(|| async { Err::<(), _>(OpError(0)) }).await;
    let _ = retrier.run(|| async { Err::<(), _>(OpError(0)) }).await;
    // The second run starts from the 2ms the first run left behind.
    assert_eq!(rand.bounds(), vec![2_000_000, 5_000_000]);
    assert_eq!(backoff.previous(), Duration::from_millis(2));

    backoff.reset();
    let _ = retrier.run(|| async { Err::<(), _>(OpError(0)) }).await;
    assert_eq!(rand.bounds(), vec![2_000_000, 5_000_000, 2_000_000]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_runs_share_one_retrier() {
    let backoff = Arc::new(RecordingBackoff::new(Duration::from_millis(10)));
    let retrier = retrier_with(&backoff, 2);

    let runs = (0..4).map(|id| {
        let retrier = retrier.clone();
        async move {
            let calls = AtomicU32::new(0);
            let result = retrier
                .run(|| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 1 {
                            Err(OpError(id))
                        } else {
                            Ok(id)
                        }
                    }
                })
                .await;
            (result, calls.load(Ordering::SeqCst))
        }
    });

    let results = futures::future::join_all(runs).await;

    for (id, (result, calls)) in results.into_iter().enumerate() {
        assert_eq!(result, Ok(id as u32));
        assert_eq!(calls, 2);
    }
    assert_eq!(backoff.attempts(), vec![0, 0, 0, 0]);
}

//! The retry loop.

use std::error::Error as StdError;
use std::fmt;
use std::future::{self, Future};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::error::{is_unretryable, BoxError, CancelledError, RetryError};
use crate::backoff::{Backoff, Constant};

/// Retry budget used by [`Retrier::new`].
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 10;

/// Information about a failed attempt, passed to the `on_retry` hook.
#[derive(Debug, Clone, Copy)]
pub struct RetryEvent<'a> {
    /// Zero-based index of the attempt that just failed.
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a (dyn StdError + 'static),
    /// How long the loop will wait before the next attempt.
    pub delay: Duration,
    /// Time since the first attempt started.
    pub elapsed: Duration,
}

type RetryHook = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Runs fallible operations again until they succeed, the attempt budget is
/// spent, or the caller cancels.
///
/// A `Retrier` is configuration only: the attempt counter of each call lives
/// on that call's stack, so one retrier can drive any number of concurrent
/// operations. Cloning is cheap and shares the backoff.
///
/// # Defaults
///
/// - 10 retries after the first attempt
/// - [`Constant`] backoff of 100ms
///
/// # Examples
///
/// ```rust
/// use backoff_retrier::backoff::CappedExponential;
/// use backoff_retrier::Retrier;
/// use std::io;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let retrier = Retrier::new()
///     .with_max_retry_attempts(3)
///     .with_backoff(CappedExponential::new(Duration::from_millis(8), Duration::from_millis(1)));
///
/// let calls = &AtomicU32::new(0);
/// let result = retrier
///     .run(move || async move {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(io::Error::other("not yet"))
///         } else {
///             Ok("done")
///         }
///     })
///     .await;
///
/// assert_eq!(result.unwrap(), "done");
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # });
/// ```
#[derive(Clone)]
pub struct Retrier {
    max_retry_attempts: u32,
    backoff: Arc<dyn Backoff>,
    on_retry: Option<RetryHook>,
}

impl Retrier {
    /// Create a retrier with the default configuration.
    pub fn new() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            backoff: Arc::new(Constant::default()),
            on_retry: None,
        }
    }

    /// Set how many times a failed operation is retried.
    ///
    /// This does not count the initial attempt: `0` means one try only and
    /// `3` means up to 4 calls in total.
    pub fn with_max_retry_attempts(mut self, n: u32) -> Self {
        self.max_retry_attempts = n;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Set a backoff strategy that is also held elsewhere.
    ///
    /// Useful with [`Decorrelated`](crate::backoff::Decorrelated), whose state
    /// the caller may want to inspect or [`reset`](crate::backoff::Decorrelated::reset).
    pub fn with_shared_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Register a hook called after each failed attempt that will be retried,
    /// before the wait starts.
    ///
    /// The hook runs synchronously on the retry path; keep it cheap.
    ///
    /// ```rust
    /// use backoff_retrier::{Retrier, RetryEvent};
    /// use std::io;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let seen = Arc::new(AtomicU32::new(0));
    /// let retrier = Retrier::new()
    ///     .with_max_retry_attempts(2)
    ///     .with_backoff(backoff_retrier::backoff::Constant::new(Duration::from_millis(1)))
    ///     .with_on_retry({
    ///         let seen = Arc::clone(&seen);
    ///         move |event: &RetryEvent<'_>| {
    ///             seen.fetch_add(1, Ordering::SeqCst);
    ///             assert_eq!(event.error.to_string(), "flaky");
    ///         }
    ///     });
    ///
    /// let _ = retrier
    ///     .run(|| async { Err::<(), _>(io::Error::other("flaky")) })
    ///     .await;
    /// assert_eq!(seen.load(Ordering::SeqCst), 2);
    /// # });
    /// ```
    pub fn with_on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// The configured retry budget.
    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }

    /// The configured backoff strategy.
    pub fn backoff(&self) -> &dyn Backoff {
        &*self.backoff
    }

    /// Run `operation` until it succeeds or the retry budget is spent.
    ///
    /// Waits between attempts are never interrupted. A synchronous operation
    /// can be adapted with `|| std::future::ready(op())`.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Operation`] with the last operation error when the
    /// budget is spent or the error is [unretryable](crate::UnretryableError).
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        self.run_with_cancel(future::pending(), operation).await
    }

    /// Run `operation` like [`run`](Self::run), giving up early once `cancel`
    /// completes.
    ///
    /// `cancel` is only consulted while waiting between attempts; an operation
    /// already in flight is never interrupted. Any future works as a signal,
    /// for example a deadline or a token's `cancelled()` future:
    ///
    /// ```rust
    /// use backoff_retrier::Retrier;
    /// use std::io;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let deadline = tokio::time::sleep(Duration::from_millis(5));
    /// let result = Retrier::new()
    ///     .run_with_cancel(deadline, || async { Err::<(), _>(io::Error::other("down")) })
    ///     .await;
    ///
    /// let err = result.unwrap_err();
    /// assert!(err.is_cancelled());
    /// assert_eq!(err.into_inner().to_string(), "down");
    /// # });
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Cancelled`] wrapping the pending operation error
    /// if `cancel` completes first, otherwise as for [`run`](Self::run).
    pub async fn run_with_cancel<C, F, Fut, T, E>(
        &self,
        cancel: C,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        C: Future<Output = ()>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        self.drive(cancel, operation, as_dyn_error::<E>).await
    }

    /// Run an operation that fails with a [`BoxError`].
    ///
    /// Boxed errors let one operation mix ordinary failures, propagated with
    /// `?`, and [unretryable](crate::unretryable) ones. The marker is found
    /// by walking the chain of the boxed error. `RetryError<BoxError>` does
    /// not implement `Error` itself; `.map_err(RetryError::into_inner)?`
    /// hands the boxed error on.
    ///
    /// ```rust
    /// use backoff_retrier::backoff::Constant;
    /// use backoff_retrier::{is_unretryable, unretryable, BoxError, Retrier};
    /// use std::io;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let calls = &AtomicU32::new(0);
    /// let result = Retrier::new()
    ///     .with_backoff(Constant::new(Duration::from_millis(1)))
    ///     .run_boxed(move || async move {
    ///         if calls.fetch_add(1, Ordering::SeqCst) == 0 {
    ///             Err::<(), _>(io::Error::other("connection reset"))?;
    ///         }
    ///         Err::<(), BoxError>(unretryable("bad request").into())
    ///     })
    ///     .await;
    ///
    /// let err = result.unwrap_err();
    /// assert!(is_unretryable(&**err.inner()));
    /// assert_eq!(calls.load(Ordering::SeqCst), 2);
    /// # });
    /// ```
    ///
    /// # Errors
    ///
    /// As for [`run`](Self::run).
    pub async fn run_boxed<F, Fut, T>(&self, operation: F) -> Result<T, RetryError<BoxError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        self.run_boxed_with_cancel(future::pending(), operation).await
    }

    /// Run an operation that fails with a [`BoxError`], giving up early once
    /// `cancel` completes.
    ///
    /// # Errors
    ///
    /// As for [`run_with_cancel`](Self::run_with_cancel).
    pub async fn run_boxed_with_cancel<C, F, Fut, T>(
        &self,
        cancel: C,
        operation: F,
    ) -> Result<T, RetryError<BoxError>>
    where
        C: Future<Output = ()>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        self.drive(cancel, operation, boxed_as_dyn_error).await
    }

    async fn drive<C, F, Fut, T, E>(
        &self,
        cancel: C,
        mut operation: F,
        as_error: AsError<E>,
    ) -> Result<T, RetryError<E>>
    where
        C: Future<Output = ()>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let start = Instant::now();
        let mut cancel = pin!(cancel);
        let mut attempt = 0u32;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.is_retryable(attempt, as_error(&error)) {
                return Err(RetryError::Operation(error));
            }

            let delay = self.backoff.delay(attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, ?delay, error = %error, "operation failed, retrying");

            if let Some(hook) = &self.on_retry {
                hook(&RetryEvent {
                    attempt,
                    error: as_error(&error),
                    delay,
                    elapsed: start.elapsed(),
                });
            }

            tokio::select! {
                biased;
                () = cancel.as_mut() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, error = %error, "cancelled while waiting to retry");
                    return Err(RetryError::Cancelled(CancelledError::new(error)));
                }
                () = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    fn is_retryable(&self, attempt: u32, error: &(dyn StdError + 'static)) -> bool {
        if is_unretryable(error) {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, error = %error, "unretryable error, giving up");
            return false;
        }

        if attempt >= self.max_retry_attempts {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                attempts = attempt + 1,
                error = %error,
                "retry attempts exhausted"
            );
            return false;
        }

        true
    }
}

/// Views an operation error as a `dyn Error` for classification and hooks.
type AsError<E> = for<'a> fn(&'a E) -> &'a (dyn StdError + 'static);

fn as_dyn_error<E: StdError + 'static>(error: &E) -> &(dyn StdError + 'static) {
    error
}

fn boxed_as_dyn_error(error: &BoxError) -> &(dyn StdError + 'static) {
    &**error
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Retrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier")
            .field("max_retry_attempts", &self.max_retry_attempts)
            .field("on_retry", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}

/// Run `operation` with a default [`Retrier`].
///
/// ```rust
/// use backoff_retrier::{retry, unretryable};
///
/// # tokio_test::block_on(async {
/// let result = retry(|| async { Err::<(), _>(unretryable("invalid credentials")) }).await;
/// assert!(result.unwrap_err().is_unretryable());
/// # });
/// ```
///
/// # Errors
///
/// See [`Retrier::run`].
pub async fn retry<F, Fut, T, E>(operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + 'static,
{
    Retrier::new().run(operation).await
}

/// Run `operation` with a default [`Retrier`], stopping early once `cancel`
/// completes.
///
/// # Errors
///
/// See [`Retrier::run_with_cancel`].
pub async fn retry_with_cancel<C, F, Fut, T, E>(
    cancel: C,
    operation: F,
) -> Result<T, RetryError<E>>
where
    C: Future<Output = ()>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + 'static,
{
    Retrier::new().run_with_cancel(cancel, operation).await
}

/// Run `operation` with a [`Retrier`] adjusted by `options`.
///
/// `options` receives the default retrier and returns the one to use, so
/// any builder method can be applied inline:
///
/// ```rust
/// use backoff_retrier::backoff::Constant;
/// use backoff_retrier::retry_with_options;
/// use std::io;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let result = retry_with_options(
///     |r| {
///         r.with_max_retry_attempts(1)
///             .with_backoff(Constant::new(Duration::from_millis(1)))
///     },
///     || async { Err::<(), _>(io::Error::other("dummy error")) },
/// )
/// .await;
/// assert!(result.unwrap_err().is_operation());
/// # });
/// ```
///
/// # Errors
///
/// See [`Retrier::run`].
pub async fn retry_with_options<O, F, Fut, T, E>(
    options: O,
    operation: F,
) -> Result<T, RetryError<E>>
where
    O: FnOnce(Retrier) -> Retrier,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + 'static,
{
    options(Retrier::new()).run(operation).await
}

/// Run `operation` with a [`Retrier`] adjusted by `options`, stopping early
/// once `cancel` completes.
///
/// # Errors
///
/// See [`Retrier::run_with_cancel`].
pub async fn retry_with_cancel_and_options<C, O, F, Fut, T, E>(
    cancel: C,
    options: O,
    operation: F,
) -> Result<T, RetryError<E>>
where
    C: Future<Output = ()>,
    O: FnOnce(Retrier) -> Retrier,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + 'static,
{
    options(Retrier::new()).run_with_cancel(cancel, operation).await
}

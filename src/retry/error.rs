//! Error types for retry operations.
//!
//! Two wrappers carry meaning for the retry loop:
//!
//! - [`UnretryableError`]: raised by the *operation* to say "stop now, this
//!   failure is permanent"
//! - [`CancelledError`]: raised by the *loop* when the cancellation signal
//!   fires while it is waiting for the next attempt
//!
//! Both keep their cause reachable through [`std::error::Error::source`], so
//! the chain helpers in this module ([`find_in_chain`], [`chain_contains`])
//! see through any number of additional wrapping layers.

use std::error::Error as StdError;
use std::fmt;

/// A type-erased, thread-safe error.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Marks a failure as permanent.
///
/// When the retry loop finds this type anywhere in an operation error's
/// `source()` chain it stops immediately and returns that error as is.
///
/// # Examples
///
/// ```rust
/// use backoff_retrier::{unretryable, is_unretryable};
/// use std::io;
///
/// let err = unretryable(io::Error::new(io::ErrorKind::InvalidInput, "bad request"));
/// assert_eq!(err.to_string(), "unretryable error: bad request");
/// assert!(is_unretryable(&err));
/// ```
#[derive(Debug)]
pub struct UnretryableError {
    cause: BoxError,
}

impl UnretryableError {
    /// Wrap an error as unretryable.
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// The wrapped error.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.cause
    }

    /// Extract the wrapped error.
    pub fn into_cause(self) -> BoxError {
        self.cause
    }
}

impl fmt::Display for UnretryableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unretryable error: {}", self.cause)
    }
}

impl StdError for UnretryableError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.cause)
    }
}

/// Wrap an error so the retry loop gives up on it immediately.
///
/// Accepts anything convertible into a [`BoxError`], including `&str` and
/// `String` messages.
pub fn unretryable(cause: impl Into<BoxError>) -> UnretryableError {
    UnretryableError::new(cause)
}

/// The cancellation signal fired while waiting between attempts.
///
/// Holds the operation error that would otherwise have been retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledError<E> {
    cause: E,
}

impl<E> CancelledError<E> {
    /// Create a cancellation error around the pending operation error.
    pub fn new(cause: E) -> Self {
        Self { cause }
    }

    /// The operation error pending when cancellation fired.
    pub fn cause(&self) -> &E {
        &self.cause
    }

    /// Extract the pending operation error.
    pub fn into_cause(self) -> E {
        self.cause
    }
}

impl<E: fmt::Display> fmt::Display for CancelledError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cancelled while waiting to retry: {}", self.cause)
    }
}

impl<E: StdError + 'static> StdError for CancelledError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.cause)
    }
}

/// Terminal error of a retry loop.
///
/// `Display` and `source()` are transparent: a `RetryError` reads exactly like
/// the error it wraps, so error reports do not repeat the message. Use
/// [`inner`](Self::inner) or [`is_unretryable`](Self::is_unretryable) to look
/// at the wrapped error itself.
///
/// # Examples
///
/// ```rust
/// use backoff_retrier::{RetryError, CancelledError};
/// use std::io;
///
/// let exhausted = RetryError::Operation(io::Error::other("timeout"));
/// assert!(exhausted.is_operation());
/// assert_eq!(exhausted.to_string(), "timeout");
///
/// let cancelled = RetryError::Cancelled(CancelledError::new(io::Error::other("timeout")));
/// assert!(cancelled.is_cancelled());
/// assert_eq!(cancelled.into_inner().to_string(), "timeout");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The last operation error, unchanged. Returned when the attempt budget
    /// is spent or the error was marked [unretryable](UnretryableError).
    Operation(E),
    /// Cancellation fired while waiting for the next attempt.
    Cancelled(CancelledError<E>),
}

impl<E> RetryError<E> {
    /// Returns true if the loop was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns true if this carries the operation error directly.
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// The last operation error, whichever way the loop ended.
    pub fn inner(&self) -> &E {
        match self {
            Self::Operation(e) => e,
            Self::Cancelled(c) => c.cause(),
        }
    }

    /// Extract the last operation error, whichever way the loop ended.
    pub fn into_inner(self) -> E {
        match self {
            Self::Operation(e) => e,
            Self::Cancelled(c) => c.into_cause(),
        }
    }

    /// Extract the operation error only if the loop was not cancelled.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::Cancelled(_) => None,
        }
    }
}

impl<E: StdError + 'static> RetryError<E> {
    /// Returns true if the last operation error was marked unretryable.
    pub fn is_unretryable(&self) -> bool {
        is_unretryable(self.inner())
    }
}

impl<E> From<CancelledError<E>> for RetryError<E> {
    fn from(err: CancelledError<E>) -> Self {
        Self::Cancelled(err)
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(e) => write!(f, "{}", e),
            Self::Cancelled(c) => write!(f, "{}", c),
        }
    }
}

// Transparent: the wrapped error is this error, so its own sources come next.
impl<E: StdError + 'static> StdError for RetryError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Operation(e) => e.source(),
            Self::Cancelled(c) => c.source(),
        }
    }
}

/// Iterator over an error and its chain of sources, outermost first.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    next: Option<&'a (dyn StdError + 'static)>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.source();
        Some(current)
    }
}

/// Walk `err` and everything it wraps.
///
/// ```rust
/// use backoff_retrier::{chain, unretryable};
///
/// let err = unretryable("disk full");
/// let messages: Vec<String> = chain(&err).map(|e| e.to_string()).collect();
/// assert_eq!(messages, ["unretryable error: disk full", "disk full"]);
/// ```
pub fn chain<'a>(err: &'a (dyn StdError + 'static)) -> Chain<'a> {
    Chain { next: Some(err) }
}

/// The first error of type `K` in the chain, if any.
pub fn find_in_chain<'a, K: StdError + 'static>(
    err: &'a (dyn StdError + 'static),
) -> Option<&'a K> {
    chain(err).find_map(|e| e.downcast_ref::<K>())
}

/// Returns true if some error in the chain has type `K`.
pub fn is_in_chain<K: StdError + 'static>(err: &(dyn StdError + 'static)) -> bool {
    find_in_chain::<K>(err).is_some()
}

/// Returns true if some error in the chain equals `cause`.
///
/// ```rust
/// use backoff_retrier::{chain_contains, CancelledError, RetryError};
///
/// #[derive(Debug, PartialEq)]
/// struct Timeout;
///
/// impl std::fmt::Display for Timeout {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("timeout")
///     }
/// }
///
/// impl std::error::Error for Timeout {}
///
/// let err = RetryError::Cancelled(CancelledError::new(Timeout));
/// assert!(chain_contains(&err, &Timeout));
/// ```
pub fn chain_contains<K>(err: &(dyn StdError + 'static), cause: &K) -> bool
where
    K: StdError + PartialEq + 'static,
{
    chain(err).any(|e| e.downcast_ref::<K>() == Some(cause))
}

/// Returns true if the chain contains an [`UnretryableError`].
///
/// A [`BoxError`] is checked through the error it holds:
///
/// ```rust
/// use backoff_retrier::{is_unretryable, unretryable, BoxError};
///
/// let err: BoxError = unretryable("bad request").into();
/// assert!(is_unretryable(&*err));
/// ```
pub fn is_unretryable(err: &(dyn StdError + 'static)) -> bool {
    is_in_chain::<UnretryableError>(err)
}

//! Random number source consumed by the jittered backoff strategies.
//!
//! Strategies only ever ask for one thing: a uniformly distributed integer in
//! `[0, bound)`. Keeping the capability this narrow lets tests substitute a
//! scripted source (see [`crate::testing`]) without touching the strategies.
//!
//! # Examples
//!
//! ```rust
//! use backoff_retrier::{Rand, Randomizer};
//!
//! let rand = Rand::new(42);
//! let n = rand.next_below(10);
//! assert!((0..10).contains(&n));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniformly distributed non-negative integers.
///
/// Implementations must be safe to share between threads: a single source is
/// commonly handed to several strategies, which may in turn be driven by
/// concurrent retry loops.
pub trait Randomizer: Send + Sync {
    /// Returns an integer in `[0, bound)`.
    ///
    /// # Panics
    ///
    /// Implementations may panic if `bound <= 0`. The strategies in this crate
    /// never pass a non-positive bound.
    fn next_below(&self, bound: i64) -> i64;
}

/// Seeded pseudo-random generator guarded by a mutex.
///
/// Cloning is not supported; share a `Rand` through an [`Arc`] instead so that
/// every consumer draws from the same sequence.
#[derive(Debug)]
pub struct Rand {
    rng: Mutex<StdRng>,
}

impl Rand {
    /// Create a generator with a fixed seed.
    ///
    /// Two generators created from the same seed yield the same sequence.
    ///
    /// ```rust
    /// use backoff_retrier::{Rand, Randomizer};
    ///
    /// let a = Rand::new(7);
    /// let b = Rand::new(7);
    /// assert_eq!(a.next_below(1_000_000), b.next_below(1_000_000));
    /// ```
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Create a generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }
}

impl Default for Rand {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl Randomizer for Rand {
    fn next_below(&self, bound: i64) -> i64 {
        assert!(bound > 0, "Randomizer::next_below called with bound {bound}");
        // A panic while holding the lock cannot leave the generator in a torn
        // state, so a poisoned lock is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(0..bound)
    }
}

impl<R: Randomizer + ?Sized> Randomizer for &R {
    fn next_below(&self, bound: i64) -> i64 {
        (**self).next_below(bound)
    }
}

impl<R: Randomizer + ?Sized> Randomizer for Arc<R> {
    fn next_below(&self, bound: i64) -> i64 {
        (**self).next_below(bound)
    }
}

impl<R: Randomizer + ?Sized> Randomizer for Box<R> {
    fn next_below(&self, bound: i64) -> i64 {
        (**self).next_below(bound)
    }
}

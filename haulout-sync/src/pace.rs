//! Pacing: cancellable sleeps and the cancellation token.
//!
//! Every deliberate wait in the crate (courtesy pauses, cooldowns,
//! `Retry-After`, backoff) goes through [`Pace::sleep`], which returns early
//! with `false` once cancellation is requested.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable cancellation flag shared between the caller and a running
/// harvest or fork sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Blocks the current thread for a duration unless cancelled.
pub trait Sleeper: Send + Sync {
    /// Returns `true` if the full duration elapsed, `false` if cancellation
    /// cut it short (or was already requested).
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool;
}

/// Real sleeper: sleeps in short slices, checking the token in between.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSleeper {
    slice: Duration,
}

impl ThreadSleeper {
    pub fn new() -> Self {
        Self {
            slice: Duration::from_millis(100),
        }
    }
}

impl Default for ThreadSleeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Sleeper for ThreadSleeper {
    /// A duration too large to express as an `Instant` waits until
    /// cancelled.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let step = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    self.slice.min(deadline - now)
                }
                None => self.slice,
            };
            std::thread::sleep(step);
        }
    }
}

/// A sleeper bound to a cancellation token.
#[derive(Clone)]
pub struct Pace {
    sleeper: Arc<dyn Sleeper>,
    cancel: CancelToken,
}

impl Pace {
    pub fn new(sleeper: Arc<dyn Sleeper>, cancel: CancelToken) -> Self {
        Self { sleeper, cancel }
    }

    /// Real-time pacing with [`ThreadSleeper`].
    pub fn real(cancel: CancelToken) -> Self {
        Self::new(Arc::new(ThreadSleeper::new()), cancel)
    }

    /// `false` when cancelled before or during the wait. A zero duration
    /// still observes cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        self.sleeper.sleep(duration, &self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl std::fmt::Debug for Pace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pace")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

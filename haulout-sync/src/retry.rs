//! Bounded retry loop shared by page fetches, forks and syncs.
//!
//! The operation classifies each attempt itself and says how long to wait
//! before the next one: the policy's exponential backoff, or a fixed
//! duration (a cooldown, or a server-directed `Retry-After`). Fixed waits do
//! not advance the backoff.

use std::time::Duration;

use crate::pace::Pace;

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The current backoff delay, which then doubles.
    Backoff,
    Fixed(Duration),
}

/// Result of one attempt.
#[derive(Debug)]
pub enum Attempt<T, F> {
    /// Stop retrying with this value (success or a permanent outcome).
    Done(T),
    /// Try again after `wait`, unless attempts are exhausted; `failure`
    /// describes this attempt and is returned if it was the last one.
    Retry { wait: Wait, failure: F },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
        }
    }

    /// One retry after a fixed cooldown.
    pub fn once_after(cooldown: Duration) -> Self {
        Self::new(2, cooldown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<F> {
    /// Every attempt asked for a retry.
    Exhausted { attempts: u32, last: F },
    /// Cancellation interrupted a wait between attempts.
    Cancelled { attempts: u32, last: F },
}

/// Run `op` until it returns [`Attempt::Done`] or the policy is exhausted.
///
/// `op` receives the 1-based attempt number. No wait happens after the
/// final attempt.
pub fn retry<T, F>(
    policy: &RetryPolicy,
    pace: &Pace,
    mut op: impl FnMut(u32) -> Attempt<T, F>,
) -> Result<T, RetryError<F>> {
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.base_backoff;
    let mut attempt = 1;

    loop {
        let (wait, failure) = match op(attempt) {
            Attempt::Done(value) => return Ok(value),
            Attempt::Retry { wait, failure } => (wait, failure),
        };

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: failure,
            });
        }

        let delay = match wait {
            Wait::Backoff => {
                let delay = backoff;
                backoff = backoff.saturating_mul(2);
                delay
            }
            Wait::Fixed(delay) => delay,
        };

        tracing::debug!(
            attempt,
            max_attempts,
            wait_ms = delay.as_millis() as u64,
            "waiting before retry"
        );
        if !pace.sleep(delay) {
            return Err(RetryError::Cancelled {
                attempts: attempt,
                last: failure,
            });
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pace::CancelToken;
    use crate::testing::RecordingSleeper;

    fn pace(sleeper: &RecordingSleeper) -> Pace {
        Pace::new(sleeper.shared(), CancelToken::new())
    }

    #[test]
    fn done_on_first_attempt_never_sleeps() {
        let sleeper = RecordingSleeper::new();
        let result: Result<u32, RetryError<()>> =
            retry(&RetryPolicy::new(5, Duration::from_secs(2)), &pace(&sleeper), |n| {
                Attempt::Done(n)
            });
        assert_eq!(result, Ok(1));
        assert!(sleeper.waits().is_empty());
    }

    #[test]
    fn backoff_doubles_and_stops_at_max_attempts() {
        let sleeper = RecordingSleeper::new();
        let mut calls = 0;
        let result: Result<(), _> =
            retry(&RetryPolicy::new(4, Duration::from_secs(2)), &pace(&sleeper), |n| {
                calls += 1;
                Attempt::Retry {
                    wait: Wait::Backoff,
                    failure: format!("attempt {n}"),
                }
            });

        assert_eq!(calls, 4);
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 4,
                last: "attempt 4".to_string()
            })
        );
        let secs: Vec<u64> = sleeper.waits().iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![2, 4, 8]);
    }

    #[test]
    fn fixed_waits_do_not_advance_backoff() {
        let sleeper = RecordingSleeper::new();
        let waits = [Wait::Fixed(Duration::from_secs(60)), Wait::Backoff, Wait::Backoff];
        let result: Result<(), RetryError<()>> =
            retry(&RetryPolicy::new(4, Duration::from_secs(2)), &pace(&sleeper), |n| {
                Attempt::Retry {
                    wait: waits[(n as usize - 1).min(2)],
                    failure: (),
                }
            });
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 4, .. })));
        let secs: Vec<u64> = sleeper.waits().iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![60, 2, 4]);
    }

    #[test]
    fn cancellation_during_wait_stops_retrying() {
        let sleeper = RecordingSleeper::new().cancel_on(1);
        let mut calls = 0;
        let result: Result<(), _> =
            retry(&RetryPolicy::new(10, Duration::from_secs(1)), &pace(&sleeper), |_| {
                calls += 1;
                Attempt::Retry {
                    wait: Wait::Backoff,
                    failure: "boom",
                }
            });
        assert_eq!(calls, 1);
        assert_eq!(
            result,
            Err(RetryError::Cancelled {
                attempts: 1,
                last: "boom"
            })
        );
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let result: Result<(), _> = retry(&policy, &pace(&sleeper), |_| Attempt::Retry {
            wait: Wait::Backoff,
            failure: 1,
        });
        assert_eq!(result, Err(RetryError::Exhausted { attempts: 1, last: 1 }));
    }
}

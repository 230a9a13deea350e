//! Bounded retry with a fixed interval
//!
//! Shared by the station-connect poll and the publish-session connect.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Blocking delay, injected so the state machine can run on a host
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// `std::thread::sleep`; on esp-idf this yields to FreeRTOS
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// `None` keeps trying until the caller cancels
    #[serde(default)]
    pub max_attempts: Option<u32>,
    pub interval_ms: u64,
}

impl RetryPolicy {
    pub const fn bounded(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            interval_ms,
        }
    }

    pub const fn unbounded(interval_ms: u64) -> Self {
        Self {
            max_attempts: None,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32, last: E },
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32, last: Option<E> },
}

/// Run `attempt` until it succeeds, the policy's attempt budget is spent, or
/// `keep_going` returns false. `keep_going` is consulted before every
/// attempt; the policy interval is slept between failed attempts only.
pub fn retry<T, E>(
    policy: &RetryPolicy,
    delay: &mut impl Delay,
    mut keep_going: impl FnMut() -> bool,
    mut attempt: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, RetryError<E>> {
    let mut attempts = 0;
    let mut last = None;

    loop {
        if !keep_going() {
            return Err(RetryError::Cancelled { attempts, last });
        }

        attempts += 1;
        match attempt(attempts) {
            Ok(value) => return Ok(value),
            Err(e) => {
                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(RetryError::Exhausted { attempts, last: e });
                }
                last = Some(e);
            }
        }

        delay.delay(policy.interval());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<Duration>);

    impl Delay for Recorder {
        fn delay(&mut self, duration: Duration) {
            self.0.push(duration);
        }
    }

    #[test]
    fn succeeds_without_sleeping() {
        let mut delay = Recorder::default();
        let r: Result<u32, RetryError<()>> =
            retry(&RetryPolicy::bounded(3, 10), &mut delay, || true, Ok);
        assert_eq!(r, Ok(1));
        assert!(delay.0.is_empty());
    }

    #[test]
    fn bounded_policy_gives_up() {
        let mut delay = Recorder::default();
        let r: Result<(), _> = retry(&RetryPolicy::bounded(4, 250), &mut delay, || true, |n| {
            Err(n)
        });
        assert_eq!(r, Err(RetryError::Exhausted { attempts: 4, last: 4 }));
        // no sleep after the final attempt
        assert_eq!(delay.0, vec![Duration::from_millis(250); 3]);
    }

    #[test]
    fn unbounded_policy_runs_until_success() {
        let mut delay = Recorder::default();
        let r = retry(&RetryPolicy::unbounded(2000), &mut delay, || true, |n| {
            if n == 7 { Ok("up") } else { Err(()) }
        });
        assert_eq!(r, Ok("up"));
        assert_eq!(delay.0.len(), 6);
    }

    #[test]
    fn cancellation_is_checked_before_each_attempt() {
        let mut delay = Recorder::default();
        let mut budget = 2;
        let r: Result<(), _> = retry(
            &RetryPolicy::unbounded(100),
            &mut delay,
            || {
                budget -= 1;
                budget >= 0
            },
            |_| Err("refused"),
        );
        assert_eq!(
            r,
            Err(RetryError::Cancelled { attempts: 2, last: Some("refused") })
        );
    }
}

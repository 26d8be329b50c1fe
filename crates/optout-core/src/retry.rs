//! Jittered exponential backoff.
//!
//! Shared by the dispatcher's bounded in-call retries and the DLQ retry
//! path. The delay schedule is pure (`base * factor^(n-2)` before attempt
//! n >= 2); jitter widens it to [0.5x, 1.5x]. Sleeping goes through the
//! `Sleeper` trait so tests never wait on the wall clock.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// BackoffPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(default = "default_tries")]
    pub tries: u32,
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_tries() -> u32 {
    3
}

fn default_base_ms() -> u64 {
    500
}

fn default_factor() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            tries: default_tries(),
            base_ms: default_base_ms(),
            factor: default_factor(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffPolicy {
    /// Pre-jitter delay before attempt `n`. Attempt 1 runs immediately.
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let ms = self.base_ms as f64 * self.factor.powi(attempt as i32 - 2);
        Duration::from_millis(ms as u64)
    }

    /// Apply jitter: a uniform draw from [0.5x, 1.5x] of `delay`.
    pub fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let scale = rand::thread_rng().gen_range(0.5..=1.5);
        Duration::from_millis((delay.as_millis() as f64 * scale) as u64)
    }
}

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

/// Clock seam for backoff delays.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper: blocks the calling thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Test sleeper: records requested delays without waiting.
#[cfg(test)]
#[derive(Default)]
pub struct NoopSleeper {
    pub slept: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl Sleeper for NoopSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

// ---------------------------------------------------------------------------
// Retry loop
// ---------------------------------------------------------------------------

/// Run `op` up to `policy.tries` times, sleeping the jittered schedule
/// between attempts. Errors failing `is_transient` are returned immediately;
/// the last error is returned when tries are exhausted.
pub fn run<T, E>(
    policy: &BackoffPolicy,
    sleeper: &dyn Sleeper,
    is_transient: impl Fn(&E) -> bool,
    mut op: impl FnMut(u32) -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    let tries = policy.tries.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_transient(&err) || attempt >= tries {
                    return Err(err);
                }
                attempt += 1;
                let delay = policy.jittered(policy.delay_before_attempt(attempt));
                sleeper.sleep(delay);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(tries: u32, jitter: bool) -> BackoffPolicy {
        BackoffPolicy {
            tries,
            base_ms: 500,
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn delay_schedule_doubles_from_base() {
        let p = policy(4, false);
        assert_eq!(p.delay_before_attempt(1), Duration::ZERO);
        assert_eq!(p.delay_before_attempt(2), Duration::from_millis(500));
        assert_eq!(p.delay_before_attempt(3), Duration::from_millis(1000));
        assert_eq!(p.delay_before_attempt(4), Duration::from_millis(2000));
    }

    #[test]
    fn jitter_stays_within_half_bounds() {
        let p = policy(4, true);
        let base = Duration::from_millis(1000);
        for _ in 0..200 {
            let jittered = p.jittered(base);
            assert!(jittered >= Duration::from_millis(500), "too low: {jittered:?}");
            assert!(jittered <= Duration::from_millis(1500), "too high: {jittered:?}");
        }
    }

    #[test]
    fn jitter_disabled_returns_exact_delay() {
        let p = policy(4, false);
        assert_eq!(p.jittered(Duration::from_millis(800)), Duration::from_millis(800));
    }

    #[test]
    fn first_success_needs_no_sleep() {
        let sleeper = NoopSleeper::default();
        let result: Result<u32, &str> = run(&policy(3, false), &sleeper, |_| true, |_| Ok(7));
        assert_eq!(result.unwrap(), 7);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let sleeper = NoopSleeper::default();
        let mut calls = 0;
        let result: Result<u32, &str> = run(
            &policy(3, false),
            &sleeper,
            |_| true,
            |attempt| {
                calls += 1;
                if attempt < 3 {
                    Err("timeout")
                } else {
                    Ok(attempt)
                }
            },
        );
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
        let slept = sleeper.slept.lock().unwrap();
        assert_eq!(slept.as_slice(), &[Duration::from_millis(500), Duration::from_millis(1000)]);
    }

    #[test]
    fn exhaustion_returns_last_error() {
        let sleeper = NoopSleeper::default();
        let mut calls = 0;
        let result: Result<u32, String> = run(
            &policy(3, false),
            &sleeper,
            |_| true,
            |attempt| {
                calls += 1;
                Err(format!("fail {attempt}"))
            },
        );
        assert_eq!(result.unwrap_err(), "fail 3");
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_transient_errors_fail_immediately() {
        let sleeper = NoopSleeper::default();
        let mut calls = 0;
        let result: Result<u32, &str> = run(
            &policy(5, false),
            &sleeper,
            |e: &&str| *e != "bad request",
            |_| {
                calls += 1;
                Err("bad request")
            },
        );
        assert_eq!(result.unwrap_err(), "bad request");
        assert_eq!(calls, 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_tries_still_runs_once() {
        let sleeper = NoopSleeper::default();
        let mut calls = 0;
        let _: Result<(), &str> = run(&policy(0, false), &sleeper, |_| true, |_| {
            calls += 1;
            Err("x")
        });
        assert_eq!(calls, 1);
    }
}

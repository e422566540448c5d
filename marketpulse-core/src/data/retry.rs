//! Bounded retry with per-attempt timeouts and jittered backoff.
//!
//! Attempt `i` (zero-based) gets a hard deadline of `base_timeout * 2^i`. The
//! call runs on its own worker thread; when the deadline passes the caller
//! stops waiting, flips the attempt's [`CancelToken`], and moves on. The
//! worker is not killed. Calls are expected to bound their own I/O (the
//! CoinGecko fetcher sets the request deadline from [`Attempt::timeout`]) and
//! to poll the token where they can.
//!
//! Only timeouts are retried. Any other error from the call is returned as-is
//! after a single attempt.
//!
//! ```text
//! Pending -> Running(0) -> Success
//!                       -> FatalError
//!                       -> RetryableTimeout -> Running(1) -> ... -> ExhaustedRetries
//! ```

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::provider::DataError;

/// Retry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (not additional retries).
    pub max_retries: u32,
    /// Deadline for the first attempt; doubles on every subsequent attempt.
    pub base_timeout: Duration,
    /// Lower bound of the uniform inter-attempt delay.
    pub jitter_min: Duration,
    /// Upper bound of the uniform inter-attempt delay.
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_timeout: Duration::from_secs(15),
            jitter_min: Duration::from_secs(1),
            jitter_max: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Deadline for attempt `index`: `base_timeout * 2^index`, saturating.
    pub fn attempt_timeout(&self, index: u32) -> Duration {
        2u32.checked_pow(index)
            .and_then(|factor| self.base_timeout.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// A uniformly random delay in `[jitter_min, jitter_max]`.
    pub fn jitter_delay(&self) -> Duration {
        let lo = self.jitter_min.as_millis() as u64;
        let hi = self.jitter_max.as_millis() as u64;
        if hi <= lo {
            return self.jitter_min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Shared flag telling an abandoned attempt its result is no longer wanted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What the wrapped call is told about the attempt it is running in.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Zero-based attempt number.
    pub index: u32,
    /// Deadline the caller will wait for this attempt.
    pub timeout: Duration,
    /// Set once the caller has given up on this attempt.
    pub cancel: CancelToken,
}

/// Run `call` under `policy`.
///
/// Returns the first successful value, the first non-timeout error unchanged,
/// or [`DataError::FetchTimeout`] once every attempt has timed out. `label`
/// identifies the request in log lines and in the timeout error.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, label: &str, call: F) -> Result<T, DataError>
where
    T: Send + 'static,
    F: Fn(&Attempt) -> Result<T, DataError> + Send + Sync + 'static,
{
    let call = Arc::new(call);
    let attempts = policy.attempts();

    for index in 0..attempts {
        let attempt = Attempt {
            index,
            timeout: policy.attempt_timeout(index),
            cancel: CancelToken::new(),
        };
        let timeout = attempt.timeout;
        let cancel = attempt.cancel.clone();

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(&call);
        thread::Builder::new()
            .name(format!("fetch-{index}"))
            .spawn(move || {
                // The receiver is gone if the caller already gave up.
                let _ = tx.send(worker(&attempt));
            })
            .map_err(|e| DataError::Other(format!("failed to spawn fetch worker: {e}")))?;

        tracing::debug!(
            label,
            attempt = index + 1,
            timeout_ms = timeout.as_millis() as u64,
            "fetch attempt started"
        );

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(DataError::FetchTimeout { .. })) => {}
            Ok(Err(e)) => return Err(e),
            Err(RecvTimeoutError::Timeout) => cancel.cancel(),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(DataError::Other(format!(
                    "fetch worker for {label} exited without a result"
                )))
            }
        }

        if index + 1 < attempts {
            let delay = policy.jitter_delay();
            tracing::warn!(
                label,
                attempt = index + 1,
                max_attempts = attempts,
                timeout_ms = timeout.as_millis() as u64,
                delay_ms = delay.as_millis() as u64,
                "fetch attempt timed out, retrying"
            );
            thread::sleep(delay);
        } else {
            tracing::warn!(
                label,
                attempt = index + 1,
                max_attempts = attempts,
                timeout_ms = timeout.as_millis() as u64,
                "fetch attempt timed out, no attempts left"
            );
        }
    }

    Err(DataError::FetchTimeout {
        label: label.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use std::time::Instant;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_timeout: Duration::from_millis(40),
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    /// Blocks until the attempt is cancelled (or a generous safety limit).
    fn hang_until_cancelled(attempt: &Attempt) {
        let started = Instant::now();
        while !attempt.cancel.is_cancelled() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn attempt_timeout_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempt_timeout(0), Duration::from_secs(15));
        assert_eq!(p.attempt_timeout(1), Duration::from_secs(30));
        assert_eq!(p.attempt_timeout(2), Duration::from_secs(60));
    }

    #[test]
    fn attempt_timeout_saturates() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempt_timeout(200), Duration::MAX);
    }

    #[test]
    fn jitter_stays_in_range() {
        let p = RetryPolicy {
            jitter_min: Duration::from_millis(10),
            jitter_max: Duration::from_millis(30),
            ..RetryPolicy::default()
        };
        for _ in 0..200 {
            let d = p.jitter_delay();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(30));
        }
    }

    #[test]
    fn always_timing_out_exhausts_every_attempt() {
        let seen: Arc<Mutex<Vec<Duration>>> = Arc::default();
        let recorder = Arc::clone(&seen);

        let result: Result<(), DataError> =
            run_with_retry(&fast_policy(3), "coingecko:bitcoin", move |attempt| {
                recorder.lock().unwrap().push(attempt.timeout);
                hang_until_cancelled(attempt);
                Ok(())
            });

        match result {
            Err(DataError::FetchTimeout { label, attempts }) => {
                assert_eq!(label, "coingecko:bitcoin");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected FetchTimeout, got {other:?}"),
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Duration::from_millis(40),
                Duration::from_millis(80),
                Duration::from_millis(160)
            ]
        );
    }

    #[test]
    fn non_timeout_error_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), DataError> = run_with_retry(&fast_policy(3), "yahoo:NOPE", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DataError::SymbolNotFound {
                symbol: "NOPE".into(),
            })
        });

        assert!(matches!(result, Err(DataError::SymbolNotFound { ref symbol }) if symbol == "NOPE"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recovers_after_a_timed_out_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = run_with_retry(&fast_policy(3), "coingecko:ethereum", move |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            if attempt.index == 0 {
                hang_until_cancelled(attempt);
            }
            Ok(attempt.index)
        });

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn timeout_reported_by_the_call_is_retried() {
        let result = run_with_retry(&fast_policy(2), "coingecko:bitcoin", move |attempt| {
            if attempt.index == 0 {
                Err(DataError::FetchTimeout {
                    label: "request deadline".into(),
                    attempts: 1,
                })
            } else {
                Ok("second")
            }
        });
        assert_eq!(result.unwrap(), "second");
    }

    #[test]
    fn abandoned_attempt_is_cancelled() {
        let tokens: Arc<Mutex<Vec<CancelToken>>> = Arc::default();
        let sink = Arc::clone(&tokens);

        let _ = run_with_retry(&fast_policy(1), "coingecko:bitcoin", move |attempt| {
            sink.lock().unwrap().push(attempt.cancel.clone());
            hang_until_cancelled(attempt);
            Ok(())
        });

        let tokens = tokens.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_cancelled());
    }

    #[test]
    fn fast_success_returns_without_waiting() {
        let started = Instant::now();
        let policy = RetryPolicy {
            base_timeout: Duration::from_secs(10),
            ..fast_policy(3)
        };
        let v = run_with_retry(&policy, "coingecko:bitcoin", |_| Ok(7)).unwrap();
        assert_eq!(v, 7);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

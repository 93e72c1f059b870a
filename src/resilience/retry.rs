//! # Bounded Retry
//!
//! Fixed-delay retry loop used for broker startup. Attempts are bounded, the
//! delay between attempts is constant, and a shutdown signal interrupts the
//! wait so a supervising process can stop startup cleanly.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Attempt count and delay for a retried operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::constants::broker::DEFAULT_MAX_ATTEMPTS,
            delay: crate::constants::broker::DEFAULT_RETRY_DELAY,
        }
    }
}

/// Why a retried operation gave up
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// A shutdown signal arrived before an attempt succeeded
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Run `operation` until it succeeds, the attempts run out, or shutdown is signalled
///
/// The operation receives the 1-based attempt number. The delay is slept only
/// between attempts, so `n` failures followed by a success wait `n * delay`.
/// A policy with zero attempts is treated as one attempt.
pub async fn retry_with_delay<T, E, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut shutdown: Option<&mut broadcast::Receiver<()>>,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let started = Instant::now();
    let mut attempt = 1;

    loop {
        debug!(
            operation = %operation_name,
            attempt = attempt,
            max_attempts = max_attempts,
            "Attempting operation"
        );

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        operation = %operation_name,
                        attempt = attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(error) if attempt >= max_attempts => {
                warn!(
                    operation = %operation_name,
                    attempts = attempt,
                    error = %error,
                    "Operation failed, no attempts left"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(error) => {
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    retry_in_ms = policy.delay.as_millis() as u64,
                    error = %error,
                    "Operation failed, retrying"
                );
            }
        }

        if wait_or_shutdown(policy.delay, shutdown.as_deref_mut()).await {
            info!(
                operation = %operation_name,
                attempts = attempt,
                "Retry loop interrupted by shutdown"
            );
            return Err(RetryError::Cancelled { attempts: attempt });
        }

        attempt += 1;
    }
}

/// Sleep for `delay`; returns true if shutdown was signalled first
async fn wait_or_shutdown(delay: Duration, shutdown: Option<&mut broadcast::Receiver<()>>) -> bool {
    match shutdown {
        Some(rx) => {
            tokio::select! {
                _ = sleep(delay) => false,
                Ok(()) = rx.recv() => true,
            }
        }
        None => {
            sleep(delay).await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_first_time_without_waiting() {
        let policy = RetryPolicy::new(5, Duration::from_secs(5));
        let start = tokio::time::Instant::now();

        let result: Result<u32, RetryError<String>> =
            retry_with_delay("test", &policy, None, |attempt| async move { Ok(attempt) }).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let policy = RetryPolicy::new(5, Duration::from_secs(5));
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let counter = calls.clone();
        let result = retry_with_delay("test", &policy, None, move |attempt| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if attempt < 5 {
                    Err(format!("attempt {attempt} refused"))
                } else {
                    Ok("connected")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let result: Result<(), RetryError<String>> =
            retry_with_delay("test", &policy, None, |attempt| async move {
                Err(format!("failure {attempt}"))
            })
            .await;

        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "failure 3");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        let result: Result<u32, RetryError<String>> =
            retry_with_delay("test", &policy, None, |attempt| async move { Ok(attempt) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_wait() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(4);

        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            let _ = shutdown_tx.send(());
        });

        let start = tokio::time::Instant::now();
        let result: Result<(), RetryError<String>> =
            retry_with_delay("test", &policy, Some(&mut shutdown_rx), |_| async {
                Err("refused".to_string())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}

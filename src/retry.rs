use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};
use crate::errors::BridgeError;

/// Fixed retry budget with a constant pause between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed beyond the first one.
    pub max_retries: u32,
    pub delay: Duration,
    pub legacy_matching: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            legacy_matching: false,
        }
    }
}

impl RetryPolicy {
    /// Runs `attempt_fn` until it succeeds, fails with a non-retryable error,
    /// or the budget is spent. The closure receives the zero-based attempt number.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt_fn: F,
    ) -> Result<T, BridgeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        let mut retries = 0;

        loop {
            match attempt_fn(retries).await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(phase = "retry_succeeded", operation, retries, "Upstream call recovered");
                    }
                    return Ok(value);
                }
                Err(error)
                    if retries < self.max_retries && error.is_retryable(self.legacy_matching) =>
                {
                    retries += 1;
                    warn!(
                        phase = "retry_scheduled",
                        operation,
                        retries,
                        max_retries = self.max_retries,
                        delay_ms = self.delay.as_millis() as u64,
                        "Retrying after transient upstream error: {error}"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;

    use super::RetryPolicy;
    use crate::errors::BridgeError;

    fn transport(status: u16, body: &str) -> BridgeError {
        BridgeError::Transport {
            status,
            body: body.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_503_five_times_with_fixed_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), BridgeError> = RetryPolicy::default()
            .run("test", |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(transport(503, "service unavailable"))
                }
            })
            .await;

        assert!(matches!(result, Err(BridgeError::Transport { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_400_immediately_without_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), BridgeError> = RetryPolicy::default()
            .run("test", |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(transport(400, "bad request"))
                }
            })
            .await;

        assert!(matches!(result, Err(BridgeError::Transport { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_429() {
        let started = Instant::now();

        let result = RetryPolicy::default()
            .run("test", |attempt| async move {
                if attempt < 2 {
                    Err(transport(429, "rate limited"))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.expect("should recover"), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), BridgeError> = RetryPolicy::default()
            .run("test", |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BridgeError::Configuration("no key".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(BridgeError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_matching_retries_any_message_with_a_five() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_retries: 2,
            legacy_matching: true,
            ..RetryPolicy::default()
        };

        let result: Result<(), BridgeError> = policy
            .run("test", |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(transport(400, "unknown model gpt-5"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

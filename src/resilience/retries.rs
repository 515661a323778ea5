//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is retryable (policy status codes only)
//! - Execute retries with exponential backoff + jitter
//! - Enforce retry throttling (token bucket shared by the channel)
//!
//! # Design Decisions
//! - Without a retry policy a call gets exactly one attempt
//! - The deadline covers every attempt and every backoff sleep
//! - Throttling only counts failures with retryable codes

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tonic::Status;

use crate::policy::{RetryPolicy, RetryThrottling};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::timeouts::with_deadline;

/// Token bucket limiting retries across a channel.
#[derive(Debug)]
pub struct RetryThrottle {
    max_tokens: f64,
    token_ratio: f64,
    tokens: Mutex<f64>,
}

impl RetryThrottle {
    pub fn new(config: &RetryThrottling) -> Self {
        let max_tokens = f64::from(config.max_tokens);
        Self {
            max_tokens,
            token_ratio: config.token_ratio,
            tokens: Mutex::new(max_tokens),
        }
    }

    pub fn record_success(&self) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        *tokens = (*tokens + self.token_ratio).min(self.max_tokens);
    }

    pub fn record_failure(&self) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        *tokens = (*tokens - 1.0).max(0.0);
    }

    /// Retries are permitted while more than half the bucket remains.
    pub fn allows_retry(&self) -> bool {
        self.tokens() > self.max_tokens / 2.0
    }

    pub fn tokens(&self) -> f64 {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run `attempt` until it succeeds, fails with a non-retryable status,
/// exhausts the policy's attempts, is throttled, or the deadline passes.
pub async fn call_with_policy<T, F, Fut>(
    deadline: Duration,
    retry: Option<&RetryPolicy>,
    throttle: Option<&RetryThrottle>,
    mut attempt: F,
) -> Result<T, Status>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Status>>,
{
    let max_attempts = retry.map_or(1, RetryPolicy::effective_max_attempts);

    with_deadline(deadline, async {
        let mut attempts = 1;
        loop {
            let status = match attempt().await {
                Ok(value) => {
                    if let Some(throttle) = throttle {
                        throttle.record_success();
                    }
                    return Ok(value);
                }
                Err(status) => status,
            };

            let Some(policy) = retry.filter(|p| p.is_retryable(status.code())) else {
                return Err(status);
            };
            if let Some(throttle) = throttle {
                throttle.record_failure();
                if !throttle.allows_retry() {
                    tracing::debug!(code = ?status.code(), "Retry throttled");
                    return Err(status);
                }
            }
            if attempts >= max_attempts {
                return Err(status);
            }

            let delay = calculate_backoff(
                attempts,
                policy.initial_backoff,
                policy.max_backoff,
                policy.backoff_multiplier,
            );
            tracing::debug!(
                attempt = attempts,
                code = ?status.code(),
                delay_ms = delay.as_millis() as u64,
                "Retrying call"
            );
            tokio::time::sleep(delay).await;
            attempts += 1;
        }
    })
    .await
}

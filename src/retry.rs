//! Bounded retry with linear backoff for outbound HTTP calls.

use reqwest::{RequestBuilder, Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// How many times an HTTP call is attempted and how long to wait between attempts.
///
/// The delay before attempt `n + 1` is `backoff * n`, so three attempts with a two second
/// backoff wait 2s and then 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Duration,
}

impl RetryPolicy {
    /// Build a policy; `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt with no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: usize) -> Duration {
        self.backoff.saturating_mul(attempt as u32)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Failure reported once every attempt has been used.
#[derive(Debug, Error)]
pub enum RetryFailure {
    /// The request never produced a response (connect error, timeout).
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("status {status}: {body}")]
    Status {
        /// Last status received.
        status: StatusCode,
        /// Body of the last response.
        body: String,
    },
}

/// Send a request under `policy`, rebuilding it for every attempt.
///
/// Transport errors and 5xx responses are retried. Any other status is returned to the caller
/// immediately: 2xx as `Ok`, 4xx as `RetryFailure::Status`.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    label: &str,
    build: F,
) -> Result<Response, RetryFailure>
where
    F: Fn() -> RequestBuilder,
{
    let build = &build;
    retry_async(policy, label, move || async move {
        match build().send().await {
            Ok(response) if response.status().is_success() => Ok(Ok(response)),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let failure = RetryFailure::Status { status, body };
                if status.is_server_error() {
                    Err(failure)
                } else {
                    Ok(Err(failure))
                }
            }
            Err(error) => Err(RetryFailure::Transport(error)),
        }
    })
    .await
    .and_then(|outcome| outcome)
}

async fn retry_async<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        tracing::debug!(
            label,
            attempt,
            max_attempts = policy.max_attempts,
            "Sending request"
        );
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Request failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                tracing::error!(label, attempts = attempt, error = %error, "All retry attempts failed");
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn retry_stops_after_max_attempts() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result: Result<(), String> = retry_async(&policy, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let result: Result<usize, String> = retry_async(&policy, "test", move || async move {
            let seen = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if seen < 2 { Err("flaky".into()) } else { Ok(seen) }
        })
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embeddings");
                then.status(404).body("model not found");
            })
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/api/embeddings", server.base_url());
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let failure = send_with_retry(&policy, "embed", || client.post(&url))
            .await
            .expect_err("404 should surface");

        mock.assert_hits(1);
        assert!(matches!(failure, RetryFailure::Status { status, .. } if status == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(503).body("loading model");
            })
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/api/chat", server.base_url());
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let failure = send_with_retry(&policy, "chat", || client.post(&url))
            .await
            .expect_err("503 should surface after retries");

        mock.assert_hits(2);
        assert!(matches!(failure, RetryFailure::Status { status, .. } if status.as_u16() == 503));
        assert_eq!(failure.to_string(), "status 503 Service Unavailable: loading model");
    }

    #[tokio::test]
    async fn transport_failure_keeps_its_source() {
        let client = reqwest::Client::new();
        let policy = RetryPolicy::none();
        let failure = send_with_retry(&policy, "embed", || {
            client.post("http://127.0.0.1:9/api/embeddings")
        })
        .await
        .expect_err("nothing listens on port 9");

        assert!(matches!(failure, RetryFailure::Transport(_)));
        let error: &dyn std::error::Error = &failure;
        assert!(error.source().is_some());
    }
}

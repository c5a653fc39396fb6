//! Bounded retry for weather-service sub-calls.
//!
//! Transient transport failures (timeouts, connection errors, 408/429/5xx)
//! are retried up to a fixed budget with a fixed backoff; everything else is
//! returned to the caller on the first attempt. The loop is an explicit
//! counter over tagged results, not error-driven control flow.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

/// How often and how long to wait between attempts for one sub-call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed delay before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, backoff: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self { max_retries, backoff }
    }

    /// A policy that never retries; used where a single attempt is the
    /// contract (geocoding).
    pub fn none() -> Self {
        Self { max_retries: 0, backoff: Duration::ZERO }
    }
}

/// Whether a transport-level error is worth another attempt.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }
    if let Some(status) = error.status() {
        return is_transient_status(status);
    }
    false
}

/// Whether a response status is worth another attempt. Client errors other
/// than 408/429 are permanent.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Run `operation` until it yields a success, a permanent failure, or the
/// retry budget runs out. The last response or error is returned either way;
/// callers still check the final status themselves.
pub async fn send_with_retry<F, Fut>(
    policy: RetryPolicy,
    operation: F,
) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tracing::debug!(attempt, max = policy.max_retries, "retrying after backoff");
            tokio::time::sleep(policy.backoff).await;
        }

        match operation().await {
            Ok(response) => {
                if is_transient_status(response.status()) && attempt < policy.max_retries {
                    tracing::warn!(
                        status = %response.status(),
                        attempt,
                        "transient status from upstream, will retry"
                    );
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                if !is_transient_error(&err) {
                    return Err(err);
                }
                tracing::warn!(attempt, error = %err, "transient transport failure");
                last_error = Some(err);
            }
        }
    }

    // Budget exhausted; the loop above stored the error on every transient
    // failure before falling through.
    Err(last_error.expect("retry loop exits early unless an error was recorded"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_documented_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff, Duration::from_millis(500));
    }

    #[test]
    fn none_policy_never_waits() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.backoff, Duration::ZERO);
    }

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert!(is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::OK));
    }
}

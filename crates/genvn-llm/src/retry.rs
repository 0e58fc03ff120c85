use std::future::Future;
use std::time::Duration;

use crate::error::ChatError;

const BASE_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 30;

/// Exponential backoff, capped.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs((BASE_BACKOFF_SECS << attempt.min(6)).min(MAX_BACKOFF_SECS))
}

/// Send an HTTP request, retrying up to `max_retries` times on transport
/// errors (connection refused, DNS failure, timeout).
///
/// Only the send itself is retried; a response with a non-success status is
/// returned as-is for the caller to classify, and is never retried here.
///
/// # Errors
///
/// Returns [`ChatError::Transport`] when all attempts are exhausted.
pub(crate) async fn send_with_retry<F, Fut>(
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, ChatError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < max_retries => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "transport error: {e}, retrying in {}s ({}/{max_retries})",
                    delay.as_secs(),
                    attempt + 1,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(ChatError::Transport(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn unreachable_endpoint_exhausts_retries() {
        let client = reqwest::Client::new();
        let result = send_with_retry(0, || client.get("http://127.0.0.1:1/x").send()).await;
        assert!(matches!(result, Err(ChatError::Transport(_))));
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn backoff_is_monotonic_and_capped(attempt in 0u32..1000) {
            let delay = backoff_delay(attempt);
            prop_assert!(delay >= Duration::from_secs(BASE_BACKOFF_SECS));
            prop_assert!(delay <= Duration::from_secs(MAX_BACKOFF_SECS));
            prop_assert!(delay <= backoff_delay(attempt.saturating_add(1)));
        }
    }

    #[tokio::test]
    async fn success_passes_through_without_status_check() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let result = send_with_retry(3, || client.get(server.uri()).send()).await;
        // Non-success statuses are not transport errors; no retry happens.
        assert_eq!(result.unwrap().status(), 503);
    }
}

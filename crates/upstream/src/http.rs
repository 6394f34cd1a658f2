//! Shared HTTP transport: JSON requests with retry and rate-limit handling.

use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tokio::time::sleep;

use crate::error::{ApiRetryClass, Result, UpstreamError};

/// Default timeout for upstream requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Attempts, backoff base and backoff cap for idempotent calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn backoff_with_jitter(&self, attempt: usize) -> Duration {
        let exp = (attempt.saturating_sub(1) as u32).min(16);
        let base_ms = self.base_delay.as_millis() as u64;
        let cap_ms = self.max_delay.as_millis() as u64;
        let backoff = base_ms.saturating_mul(1_u64 << exp).min(cap_ms);
        let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
        Duration::from_millis(backoff.saturating_add(jitter).min(cap_ms.max(1)))
    }

    /// Wait before the one extra rate-limited attempt. An advertised
    /// `Retry-After` is honored as sent; `max_delay` only caps backoff.
    fn rate_limit_wait(&self, advertised: Option<Duration>) -> Duration {
        advertised.unwrap_or(self.base_delay)
    }
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// JSON-over-HTTP client shared by the adapters.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn log_response(status: StatusCode, url: &str, body: &str) {
        if status.is_success() {
            debug!("[Upstream] {} -> {}", url, status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[Upstream] {} -> {}: {}", url, status, preview);
    }

    /// GET returning the decoded body, or `None` on 404.
    pub async fn get_json(&self, url: &str, headers: &HeaderMap) -> Result<Option<Value>> {
        self.send_with_retry(url, || self.client.get(url).headers(headers.clone()))
            .await
    }

    /// POST of a read-only search body. Retried like a GET.
    pub async fn post_json(&self, url: &str, headers: &HeaderMap, body: &Value) -> Result<Option<Value>> {
        self.send_with_retry(url, || {
            self.client
                .post(url)
                .headers(headers.clone())
                .json(body)
        })
        .await
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Option<Value>>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        let mut rate_limit_wait_used = false;

        loop {
            attempt = attempt.saturating_add(1);
            let response = match build().send().await {
                Ok(response) => response,
                Err(err) => {
                    if is_retryable_transport_error(&err) && attempt < self.policy.max_attempts {
                        let backoff = self.policy.backoff_with_jitter(attempt);
                        debug!(
                            "[Upstream] retry {}/{} for {} after transport error: {}",
                            attempt + 1,
                            self.policy.max_attempts,
                            url,
                            err
                        );
                        sleep(backoff).await;
                        continue;
                    }
                    return Err(UpstreamError::Http(err));
                }
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                debug!("[Upstream] {} -> 404", url);
                return Ok(None);
            }
            let advertised_wait = retry_after(response.headers());
            let body = response.text().await?;
            Self::log_response(status, url, &body);

            if status.is_success() {
                if body.trim().is_empty() {
                    return Ok(Some(Value::Null));
                }
                return Ok(Some(serde_json::from_str(&body)?));
            }

            let error = UpstreamError::api(status.as_u16(), format!("Request failed: {}", body));

            if status == StatusCode::TOO_MANY_REQUESTS && !rate_limit_wait_used {
                // One extra wait that does not consume an attempt.
                rate_limit_wait_used = true;
                attempt -= 1;
                let wait = self.policy.rate_limit_wait(advertised_wait);
                warn!("[Upstream] rate limited by {}, waiting {:?}", url, wait);
                sleep(wait).await;
                continue;
            }

            if error.retry_class() == ApiRetryClass::Retryable && attempt < self.policy.max_attempts {
                let backoff = self.policy.backoff_with_jitter(attempt);
                debug!(
                    "[Upstream] retry {}/{} for {} after HTTP {}",
                    attempt + 1,
                    self.policy.max_attempts,
                    url,
                    status.as_u16()
                );
                sleep(backoff).await;
                continue;
            }

            if attempt > 1 {
                warn!(
                    "[Upstream] {} failed after {} attempts with HTTP {}",
                    url,
                    attempt,
                    status.as_u16()
                );
            }
            return Err(error);
        }
    }
}

/// `Authorization: Bearer` plus JSON accept headers.
pub(crate) fn bearer_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("application/json"),
    );
    if token.trim().is_empty() {
        return Err(UpstreamError::auth("Access token is empty"));
    }
    let auth_value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
        .map_err(|_| UpstreamError::auth("Invalid access token format"))?;
    headers.insert(reqwest::header::AUTHORIZATION, auth_value);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{start_mock_server, MockOutcome};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::respond(503, r#"{"error":"busy"}"#),
            MockOutcome::respond(500, r#"{"error":"oops"}"#),
            MockOutcome::respond(200, r#"{"ok":true}"#),
        ])
        .await;

        let transport = HttpTransport::new(fast_policy()).expect("transport");
        let body = transport
            .get_json(&format!("{}/things", base_url), &HeaderMap::new())
            .await
            .expect("request");

        assert_eq!(body, Some(serde_json::json!({ "ok": true })));
        assert_eq!(captured.lock().await.len(), 3);
        server.abort();
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_ceiling() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::respond(502, "bad gateway"),
            MockOutcome::respond(502, "bad gateway"),
            MockOutcome::respond(502, "bad gateway"),
            MockOutcome::respond(200, "{}"),
        ])
        .await;

        let transport = HttpTransport::new(fast_policy()).expect("transport");
        let err = transport
            .get_json(&format!("{}/things", base_url), &HeaderMap::new())
            .await
            .expect_err("should fail");

        assert_eq!(err.status_code(), Some(502));
        assert_eq!(captured.lock().await.len(), 3);
        server.abort();
    }

    #[tokio::test]
    async fn client_errors_are_not_retried_and_404_is_none() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::respond(404, r#"{"error":"missing"}"#),
            MockOutcome::respond(400, r#"{"error":"bad query"}"#),
        ])
        .await;

        let transport = HttpTransport::new(fast_policy()).expect("transport");
        let missing = transport
            .get_json(&format!("{}/users/nobody", base_url), &HeaderMap::new())
            .await
            .expect("404 is not an error");
        assert!(missing.is_none());

        let err = transport
            .get_json(&format!("{}/users?bad", base_url), &HeaderMap::new())
            .await
            .expect_err("400 propagates");
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(captured.lock().await.len(), 2);
        server.abort();
    }

    #[tokio::test]
    async fn rate_limit_gets_one_extra_wait() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::respond(429, "slow down").with_header("Retry-After", "0"),
            MockOutcome::respond(500, "oops"),
            MockOutcome::respond(500, "oops"),
            MockOutcome::respond(200, r#"[1,2]"#),
        ])
        .await;

        let transport = HttpTransport::new(fast_policy()).expect("transport");
        let body = transport
            .get_json(&format!("{}/things", base_url), &HeaderMap::new())
            .await
            .expect("request");

        assert_eq!(body, Some(serde_json::json!([1, 2])));
        assert_eq!(captured.lock().await.len(), 4);
        server.abort();
    }

    #[tokio::test]
    async fn dropped_connections_are_retried() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::DropConnection,
            MockOutcome::respond(200, r#"{"ok":1}"#),
        ])
        .await;

        let transport = HttpTransport::new(fast_policy()).expect("transport");
        let body = transport
            .get_json(&format!("{}/things", base_url), &HeaderMap::new())
            .await
            .expect("request");

        assert!(body.is_some());
        assert_eq!(captured.lock().await.len(), 2);
        server.abort();
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert!(policy.backoff_with_jitter(1) >= Duration::from_secs(2));
        assert!(policy.backoff_with_jitter(10) <= Duration::from_secs(60));
    }

    #[test]
    fn advertised_rate_limit_wait_is_not_capped() {
        let policy = fast_policy();
        assert_eq!(
            policy.rate_limit_wait(Some(Duration::from_secs(120))),
            Duration::from_secs(120)
        );
        assert_eq!(policy.rate_limit_wait(None), policy.base_delay);
    }

    #[test]
    fn retry_after_header_is_read_in_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "90".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(90)));
        headers.insert(RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }
}

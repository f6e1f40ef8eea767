//! HTTP execution with a hard per-attempt timeout and bounded
//! exponential-backoff retry for the retryable failure classes.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use super::transport::{HttpReply, Transport};
use super::{ApiError, GenerateRequest};

/// Error body shape the API uses: `{ "error": { "message": "..." } }`.
/// Extraction is best-effort; anything else falls back to the status line.
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

pub struct RetryingHttpClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    max_retries: u32,
}

impl RetryingHttpClient {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            transport,
            timeout,
            max_retries,
        }
    }

    /// Send the request, returning the raw success body.
    ///
    /// Each attempt races the transport against the timeout; a fired
    /// timer abandons the in-flight attempt (its eventual result is
    /// discarded). Retryable failures back off `1s * 2^attempt` while
    /// the attempt count is below `max_retries`; the last error is
    /// surfaced unchanged once retries are exhausted.
    pub async fn send(&self, url: &str, request: &GenerateRequest) -> Result<String, ApiError> {
        let mut attempt: u32 = 0;

        loop {
            let result = tokio::time::timeout(self.timeout, self.transport.execute(url, request))
                .await
                .map_err(|_| ApiError::Timeout)
                .and_then(|r| r);

            let err = match result {
                Ok(reply) if (200..300).contains(&reply.status) => return Ok(reply.body),
                Ok(reply) => http_error(&reply),
                Err(e) => e,
            };

            if attempt < self.max_retries && err.is_retryable() {
                let wait = Duration::from_millis(1000 * (1 << attempt));
                warn!(
                    attempt,
                    max_retries = self.max_retries,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            return Err(err);
        }
    }
}

/// Turn a non-success reply into an `ApiError::Http`, preferring the
/// structured message from the body.
fn http_error(reply: &HttpReply) -> ApiError {
    let from_body = serde_json::from_str::<ErrorBody>(&reply.body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message);

    let message = from_body.unwrap_or_else(|| {
        let reason = reqwest::StatusCode::from_u16(reply.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown Status");
        format!("{} {}", reply.status, reason)
    });

    ApiError::Http {
        status: reply.status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// Transport that replies with a fixed status and counts attempts.
    struct FixedStatus {
        status: u16,
        body: String,
        attempts: AtomicU32,
    }

    impl FixedStatus {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.to_string(),
                attempts: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for FixedStatus {
        async fn execute(
            &self,
            _url: &str,
            _request: &GenerateRequest,
        ) -> Result<HttpReply, ApiError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(HttpReply {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    /// Transport that never resolves.
    struct NeverResolves {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Transport for NeverResolves {
        async fn execute(
            &self,
            _url: &str,
            _request: &GenerateRequest,
        ) -> Result<HttpReply, ApiError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    /// Transport that fails `failures` times with 503, then succeeds.
    struct FlakyThenOk {
        failures: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Transport for FlakyThenOk {
        async fn execute(
            &self,
            _url: &str,
            _request: &GenerateRequest,
        ) -> Result<HttpReply, ApiError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Ok(HttpReply {
                    status: 503,
                    body: String::new(),
                })
            } else {
                Ok(HttpReply {
                    status: 200,
                    body: "ok".to_string(),
                })
            }
        }
    }

    fn request() -> GenerateRequest {
        GenerateRequest::new("p".into(), 0.4)
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhaustion_makes_initial_plus_max_retries_attempts() {
        let transport = FixedStatus::new(503, "");
        let client =
            RetryingHttpClient::new(transport.clone(), Duration::from_secs(15), 2);

        let err = client.send("http://unit.test", &request()).await.unwrap_err();
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
        match err {
            ApiError::Http { status: 503, .. } => {}
            other => panic!("expected 503 error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_status_short_circuits() {
        let transport = FixedStatus::new(401, "");
        let client =
            RetryingHttpClient::new(transport.clone(), Duration::from_secs(15), 5);

        let err = client.send("http://unit.test", &request()).await.unwrap_err();
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
        match err {
            ApiError::Http { status: 401, .. } => {}
            other => panic!("expected 401 error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_race_rejects_with_timeout() {
        let transport = Arc::new(NeverResolves {
            attempts: AtomicU32::new(0),
        });
        let client = RetryingHttpClient::new(transport.clone(), Duration::from_millis(50), 0);

        let err = client.send("http://unit.test", &request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let transport = Arc::new(FlakyThenOk {
            failures: 2,
            attempts: AtomicU32::new(0),
        });
        let client = RetryingHttpClient::new(transport.clone(), Duration::from_secs(15), 2);

        let body = client.send("http://unit.test", &request()).await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn error_message_extracted_from_body() {
        let transport =
            FixedStatus::new(400, r#"{"error": {"message": "API key not valid"}}"#);
        let client = RetryingHttpClient::new(transport, Duration::from_secs(15), 2);

        let err = client.send("http://unit.test", &request()).await.unwrap_err();
        match err {
            ApiError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_message_falls_back_to_status_line() {
        let transport = FixedStatus::new(403, "not json");
        let client = RetryingHttpClient::new(transport, Duration::from_secs(15), 0);

        let err = client.send("http://unit.test", &request()).await.unwrap_err();
        match err {
            ApiError::Http { message, .. } => assert_eq!(message, "403 Forbidden"),
            other => panic!("expected http error, got {other:?}"),
        }
    }
}

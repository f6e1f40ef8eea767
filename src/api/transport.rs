//! Transport seam: the retry client talks to this trait, not to reqwest
//! directly, so tests can substitute a scripted stub.

use std::time::Duration;

use async_trait::async_trait;

use super::{ApiError, GenerateRequest};

/// A completed HTTP exchange, success or not. Status classification
/// happens in the client, not here.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one POST of the request body to `url`. Errors are
    /// transport-level only (connection, TLS, ...); any HTTP status
    /// comes back as a reply.
    async fn execute(&self, url: &str, request: &GenerateRequest) -> Result<HttpReply, ApiError>;
}

/// Production transport over a pooled reqwest client.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// The client applies its own deadline per attempt, so no reqwest
    /// timeout is set here.
    pub fn new() -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, url: &str, request: &GenerateRequest) -> Result<HttpReply, ApiError> {
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(HttpReply { status, body })
    }
}

//! Gemini generateContent API: wire types, transport seam, retrying
//! client, response parsing.

pub mod client;
pub mod response;
pub mod transport;

use serde::Serialize;

pub use client::RetryingHttpClient;
pub use transport::{HttpReply, ReqwestTransport, Transport};

/// Default generation endpoint. The credential is appended as a `?key=`
/// query parameter by the caller.
pub const API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

#[derive(Debug)]
pub enum ApiError {
    /// The timeout fired before the attempt completed.
    Timeout,
    /// Transport-level failure (DNS, connection reset, TLS, ...).
    Network(String),
    /// Non-success HTTP status, with the best-effort message extracted
    /// from the error body.
    Http { status: u16, message: String },
    /// The response body did not match the expected candidate shape.
    MalformedResponse(String),
}

impl ApiError {
    /// Failure classes worth reissuing the request for: timeout, generic
    /// network failure, 429, 500, 503. Everything else propagates as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Network(_) => true,
            ApiError::Http { status, .. } => matches!(status, 429 | 500 | 503),
            ApiError::MalformedResponse(_) => false,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Timeout => write!(f, "request timed out"),
            ApiError::Network(msg) => write!(f, "network error: {msg}"),
            ApiError::Http { status, message } => write!(f, "API error ({status}): {message}"),
            ApiError::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

// --- Request wire types ---

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

impl GenerateRequest {
    /// Single-part request with the fixed sampling parameters the
    /// explainer uses; only temperature varies (regenerate runs hotter).
    pub fn new(prompt: String, temperature: f64) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature,
                top_k: 32,
                top_p: 0.95,
                max_output_tokens: 1000,
            },
        }
    }
}

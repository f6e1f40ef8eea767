//! Response body validation: pull the first candidate's text out of a
//! generateContent reply, or fail with a malformed-response error.

use serde::Deserialize;

use super::ApiError;

/// Shown when the API answers with a well-formed but empty part; the
/// success path never yields an empty string.
pub const EMPTY_RESULT_PLACEHOLDER: &str = "No explanation was returned.";

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Extract the explanation text from a raw response body.
pub fn parse(body: &str) -> Result<String, ApiError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ApiError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let mut candidates = response
        .candidates
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::MalformedResponse("no candidates".into()))?;

    let content = candidates
        .swap_remove(0)
        .content
        .ok_or_else(|| ApiError::MalformedResponse("candidate has no content".into()))?;

    let mut parts = content
        .parts
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::MalformedResponse("content has no parts".into()))?;

    let text = parts.swap_remove(0).text.unwrap_or_default();
    if text.is_empty() {
        Ok(EMPTY_RESULT_PLACEHOLDER.to_string())
    } else {
        Ok(text)
    }
}

//! Translation orchestration: input validation, credential resolution,
//! prompt construction, API call, response parsing, outcome bookkeeping.
//! Raw errors never cross the UI boundary; `error()` always holds a
//! user-facing formatted message after a failure.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::response;
use crate::api::transport::Transport;
use crate::api::{ApiError, GenerateRequest, RetryingHttpClient, API_URL};
use crate::history::HistoryError;
use crate::prompt::{self, ContentType, ExplainLevel};
use crate::settings::{redact_key, SettingsRepository};
use crate::state::{RunState, RunStateMachine};
use crate::storage::StorageError;

/// Hard deadline per run attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Retries after the initial attempt.
const MAX_RETRIES: u32 = 2;
const TEMPERATURE: f64 = 0.4;
/// Regenerate runs slightly hotter to get a different wording.
const REGENERATE_TEMPERATURE: f64 = 0.6;

#[derive(Debug)]
pub enum ExplainError {
    /// The input was empty after trimming.
    EmptyInput,
    /// No API key is configured.
    MissingCredential,
    /// A precondition on the request failed (e.g. regenerate without a
    /// prior result).
    Validation(String),
    Api(ApiError),
    Storage(StorageError),
}

impl std::fmt::Display for ExplainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExplainError::EmptyInput => write!(f, "input is empty"),
            ExplainError::MissingCredential => write!(f, "API key is not configured"),
            ExplainError::Validation(msg) => write!(f, "invalid request: {msg}"),
            ExplainError::Api(e) => write!(f, "{e}"),
            ExplainError::Storage(e) => write!(f, "{e}"),
        }
    }
}

impl From<ApiError> for ExplainError {
    fn from(e: ApiError) -> Self {
        ExplainError::Api(e)
    }
}

impl From<StorageError> for ExplainError {
    fn from(e: StorageError) -> Self {
        ExplainError::Storage(e)
    }
}

impl From<HistoryError> for ExplainError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::Validation(msg) => ExplainError::Validation(msg),
            HistoryError::Storage(e) => ExplainError::Storage(e),
        }
    }
}

/// Map an error to the message shown to the user.
pub fn user_message(err: &ExplainError) -> String {
    match err {
        ExplainError::EmptyInput => {
            "Enter some code or an error message first.".to_string()
        }
        ExplainError::MissingCredential => {
            "No API key is configured. Open the settings and enter your API key.".to_string()
        }
        ExplainError::Api(ApiError::Timeout) | ExplainError::Api(ApiError::Network(_)) => {
            "There is a problem with the network connection. Check your internet connection."
                .to_string()
        }
        ExplainError::Api(ApiError::Http { status, message }) => {
            if matches!(*status, 401 | 403) || message.contains("API key") {
                "Your API key is invalid or expired. Check the API key in the settings."
                    .to_string()
            } else if *status == 429 || message.contains("quota") || message.contains("rate limit")
            {
                "The API usage limit was reached. Wait a while and try again.".to_string()
            } else {
                format!("An error occurred: {err}")
            }
        }
        other => format!("An error occurred: {other}"),
    }
}

/// Coordinates one explain request end to end. Callers are expected to
/// issue at most one `run` at a time (the UI disables the action while
/// `loading()` is true); concurrent runs are not coordinated here.
pub struct Orchestrator {
    settings: Arc<SettingsRepository>,
    client: RetryingHttpClient,
    endpoint: String,
    state: RunStateMachine,
    result: RwLock<Option<String>>,
    error: RwLock<Option<String>>,
}

impl Orchestrator {
    pub fn new(settings: Arc<SettingsRepository>, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            client: RetryingHttpClient::new(transport, REQUEST_TIMEOUT, MAX_RETRIES),
            endpoint: API_URL.to_string(),
            state: RunStateMachine::new(),
            result: RwLock::new(None),
            error: RwLock::new(None),
        }
    }

    /// Explain the given input.
    pub async fn run(
        &self,
        text: &str,
        content_type: ContentType,
        level: ExplainLevel,
    ) -> Result<String, ExplainError> {
        self.execute(text, content_type, level, false).await
    }

    /// Ask for a more detailed explanation of the same input, based on
    /// the result currently held. The existing result stays visible
    /// while the request is in flight.
    pub async fn regenerate(&self, text: &str) -> Result<String, ExplainError> {
        self.execute(text, ContentType::Auto, ExplainLevel::Detailed, true)
            .await
    }

    async fn execute(
        &self,
        text: &str,
        content_type: ContentType,
        level: ExplainLevel,
        regenerate: bool,
    ) -> Result<String, ExplainError> {
        // Fast-fail guards; no transition to Running, no network.
        if text.trim().is_empty() {
            return Err(self.fail_fast(ExplainError::EmptyInput));
        }
        let previous = if regenerate {
            match self.result.read().clone() {
                Some(prev) => Some(prev),
                None => {
                    return Err(self.fail_fast(ExplainError::Validation(
                        "no previous result to regenerate from".into(),
                    )))
                }
            }
        } else {
            None
        };

        let _ = self.state.transition(RunState::Running);
        *self.error.write() = None;
        if !regenerate {
            *self.result.write() = None;
        }

        let request_id = Uuid::new_v4();
        match self
            .perform(request_id, text, content_type, level, previous)
            .await
        {
            Ok(parsed) => {
                *self.result.write() = Some(parsed.clone());
                let _ = self.state.transition(RunState::Succeeded);
                let _ = self.state.transition(RunState::Idle);
                Ok(parsed)
            }
            Err(err) => {
                warn!(%request_id, error = %err, "explain run failed");
                *self.error.write() = Some(user_message(&err));
                let _ = self.state.transition(RunState::Failed);
                let _ = self.state.transition(RunState::Idle);
                Err(err)
            }
        }
    }

    fn fail_fast(&self, err: ExplainError) -> ExplainError {
        *self.error.write() = Some(user_message(&err));
        err
    }

    async fn perform(
        &self,
        request_id: Uuid,
        text: &str,
        content_type: ContentType,
        level: ExplainLevel,
        previous: Option<String>,
    ) -> Result<String, ExplainError> {
        let settings = self.settings.load().await?;
        if settings.api_key.is_empty() {
            return Err(ExplainError::MissingCredential);
        }

        let regenerate = previous.is_some();
        let prompt = match previous {
            Some(prev) => prompt::build_regenerate(text, &prev),
            None => prompt::build(text, content_type, level),
        };
        let temperature = if regenerate {
            REGENERATE_TEMPERATURE
        } else {
            TEMPERATURE
        };
        let request = GenerateRequest::new(prompt, temperature);

        info!(
            %request_id,
            regenerate,
            %content_type,
            %level,
            api_key = %redact_key(&settings.api_key),
            "sending generate request"
        );

        let url = format!("{}?key={}", self.endpoint, settings.api_key);
        let body = self.client.send(&url, &request).await?;
        let parsed = response::parse(&body)?;

        info!(%request_id, chars = parsed.len(), "explain run succeeded");
        Ok(parsed)
    }

    /// True while a run is in flight.
    pub fn loading(&self) -> bool {
        self.state.current() == RunState::Running
    }

    pub fn state(&self) -> RunState {
        self.state.current()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Last successful result, if any.
    pub fn result(&self) -> Option<String> {
        self.result.read().clone()
    }

    /// User-facing message for the last failure, if any.
    pub fn error(&self) -> Option<String> {
        self.error.read().clone()
    }

    pub fn clear_result(&self) {
        *self.result.write() = None;
    }

    pub fn clear_error(&self) {
        *self.error.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;
    use crate::api::transport::HttpReply;
    use crate::storage::MemoryStore;

    /// Transport that pops scripted replies and records request bodies.
    /// The last reply is repeated once the script runs out.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<(u16, String)>>,
        seen: Mutex<Vec<Value>>,
        attempts: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<(u16, &str)>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|(s, b)| (s, b.to_string()))
                        .collect(),
                ),
                seen: Mutex::new(Vec::new()),
                attempts: AtomicU32::new(0),
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(
            &self,
            _url: &str,
            request: &GenerateRequest,
        ) -> Result<HttpReply, ApiError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(serde_json::to_value(request).unwrap());

            let mut replies = self.replies.lock();
            let (status, body) = if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            };
            Ok(HttpReply { status, body })
        }
    }

    const OK_BODY: &str =
        r#"{"candidates": [{"content": {"parts": [{"text": "It prints hello."}]}}]}"#;

    async fn orchestrator_with(
        replies: Vec<(u16, &str)>,
        api_key: &str,
    ) -> (Arc<ScriptedTransport>, Orchestrator) {
        let store = Arc::new(MemoryStore::new());
        let settings = Arc::new(SettingsRepository::new(store));
        if !api_key.is_empty() {
            settings.update_api_key(api_key).await.unwrap();
        }
        let transport = ScriptedTransport::new(replies);
        let orchestrator = Orchestrator::new(settings, transport.clone());
        (transport, orchestrator)
    }

    #[tokio::test]
    async fn blank_input_never_reaches_the_network() {
        let (transport, orchestrator) = orchestrator_with(vec![(200, OK_BODY)], "key").await;

        let err = orchestrator
            .run("   ", ContentType::Auto, ExplainLevel::Simple)
            .await
            .unwrap_err();
        assert!(matches!(err, ExplainError::EmptyInput));
        assert_eq!(transport.attempts(), 0);
        assert_eq!(orchestrator.state(), RunState::Idle);
        assert!(orchestrator.error().is_some());
    }

    #[tokio::test]
    async fn missing_credential_skips_the_network() {
        let (transport, orchestrator) = orchestrator_with(vec![(200, OK_BODY)], "").await;

        let err = orchestrator
            .run("some code", ContentType::Code, ExplainLevel::Simple)
            .await
            .unwrap_err();
        assert!(matches!(err, ExplainError::MissingCredential));
        assert_eq!(transport.attempts(), 0);
        let message = orchestrator.error().unwrap();
        assert!(message.contains("API key"), "got: {message}");
    }

    #[tokio::test]
    async fn successful_run_stores_result_and_returns_to_idle() {
        let (transport, orchestrator) = orchestrator_with(vec![(200, OK_BODY)], "key").await;

        let text = orchestrator
            .run("print(\"hello\")", ContentType::Code, ExplainLevel::Simple)
            .await
            .unwrap();
        assert_eq!(text, "It prints hello.");
        assert_eq!(orchestrator.result().as_deref(), Some("It prints hello."));
        assert!(orchestrator.error().is_none());
        assert!(!orchestrator.loading());
        assert_eq!(orchestrator.state(), RunState::Idle);
        assert_eq!(transport.attempts(), 1);

        // The prompt carried the input verbatim at normal temperature.
        let request = transport.seen.lock()[0].clone();
        let prompt = request["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("print(\"hello\")"));
        assert_eq!(request["generationConfig"]["temperature"], 0.4);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_formats_a_try_again_message() {
        let (transport, orchestrator) = orchestrator_with(vec![(429, "")], "key").await;

        let err = orchestrator
            .run("code", ContentType::Code, ExplainLevel::Simple)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExplainError::Api(ApiError::Http { status: 429, .. })
        ));
        // Initial attempt plus two retries; 429 is retryable.
        assert_eq!(transport.attempts(), 3);
        let message = orchestrator.error().unwrap();
        assert!(message.contains("try again"), "got: {message}");
    }

    #[tokio::test]
    async fn auth_failure_points_at_the_api_key() {
        let (transport, orchestrator) = orchestrator_with(
            vec![(401, r#"{"error": {"message": "API key not valid"}}"#)],
            "key",
        )
        .await;

        orchestrator
            .run("code", ContentType::Code, ExplainLevel::Simple)
            .await
            .unwrap_err();
        assert_eq!(transport.attempts(), 1);
        let message = orchestrator.error().unwrap();
        assert!(message.contains("API key"), "got: {message}");
    }

    #[tokio::test]
    async fn malformed_response_becomes_a_generic_message() {
        let (_transport, orchestrator) =
            orchestrator_with(vec![(200, r#"{"candidates": []}"#)], "key").await;

        let err = orchestrator
            .run("code", ContentType::Code, ExplainLevel::Simple)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExplainError::Api(ApiError::MalformedResponse(_))
        ));
        let message = orchestrator.error().unwrap();
        assert!(message.starts_with("An error occurred:"), "got: {message}");
    }

    #[tokio::test]
    async fn regenerate_requires_a_prior_result() {
        let (transport, orchestrator) = orchestrator_with(vec![(200, OK_BODY)], "key").await;

        let err = orchestrator.regenerate("code").await.unwrap_err();
        assert!(matches!(err, ExplainError::Validation(_)));
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn regenerate_embeds_the_previous_result_and_runs_hotter() {
        let (transport, orchestrator) = orchestrator_with(vec![(200, OK_BODY)], "key").await;

        orchestrator
            .run("let x = 1;", ContentType::Code, ExplainLevel::Simple)
            .await
            .unwrap();
        orchestrator.regenerate("let x = 1;").await.unwrap();

        let request = transport.seen.lock()[1].clone();
        let prompt = request["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("let x = 1;"));
        assert!(prompt.contains("It prints hello."));
        assert_eq!(request["generationConfig"]["temperature"], 0.6);
    }

    #[tokio::test]
    async fn failure_replaces_result_only_on_normal_runs() {
        let (_transport, orchestrator) =
            orchestrator_with(vec![(200, OK_BODY), (400, "")], "key").await;

        orchestrator
            .run("code", ContentType::Code, ExplainLevel::Simple)
            .await
            .unwrap();
        // Regenerate fails; the previous result stays visible.
        orchestrator.regenerate("code").await.unwrap_err();
        assert_eq!(orchestrator.result().as_deref(), Some("It prints hello."));

        orchestrator.clear_error();
        assert!(orchestrator.error().is_none());
        orchestrator.clear_result();
        assert!(orchestrator.result().is_none());
    }
}

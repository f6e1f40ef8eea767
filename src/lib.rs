//! Kaidoku: Gemini-backed code and error explainer core.
//! Request/response orchestration plus settings, history, and session
//! persistence over a pluggable key-value store. The presentation layer
//! sits on top of [`AppContext`] and is not part of this crate.

pub mod api;
pub mod history;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod settings;
pub mod state;
pub mod storage;

use std::sync::Arc;

use tracing::info;

use api::transport::{ReqwestTransport, Transport};
use api::ApiError;
use history::HistoryRepository;
use orchestrator::Orchestrator;
use session::SessionCache;
use settings::SettingsRepository;
use storage::KeyValueStore;

/// Everything the presentation layer talks to, wired over one store.
pub struct AppContext {
    pub settings: Arc<SettingsRepository>,
    pub history: Arc<HistoryRepository>,
    pub session: Arc<SessionCache>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppContext {
    /// Wire the repositories and orchestrator over the given store with
    /// the production HTTP transport.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(store, transport))
    }

    /// Same wiring with a caller-supplied transport (tests, proxies).
    pub fn with_transport(store: Arc<dyn KeyValueStore>, transport: Arc<dyn Transport>) -> Self {
        let settings = Arc::new(SettingsRepository::new(store.clone()));
        let history = Arc::new(HistoryRepository::new(store.clone(), settings.clone()));
        let session = Arc::new(SessionCache::new(store));
        let orchestrator = Arc::new(Orchestrator::new(settings.clone(), transport));

        info!("app context wired");

        Self {
            settings,
            history,
            session,
            orchestrator,
        }
    }
}

/// Install the tracing subscriber. Call once at startup.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kaidoku=debug".parse().expect("static filter parses")),
        )
        .with_target(true)
        .init();
}

//! Settings persistence. One logical record per installation, stored
//! field-per-key; reads substitute documented defaults so a fresh (or
//! partially written) store never fails to load.

use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::prompt::ExplainLevel;
use crate::storage::{keys, KeyValueStore, StorageError};

pub const DEFAULT_FONT_SIZE: u32 = 14;
pub const DEFAULT_MAX_HISTORY_ITEMS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Dark
    }
}

impl FromStr for Theme {
    type Err = std::convert::Infallible;

    /// Unknown values fall back to the default theme.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "light" => Theme::Light,
            "system" => Theme::System,
            _ => Theme::Dark,
        })
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        };
        write!(f, "{s}")
    }
}

/// The full settings record. `api_key` empty means unconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub api_key: String,
    pub theme: Theme,
    pub font_size: u32,
    pub language_mode: ExplainLevel,
    pub max_history_items: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            theme: Theme::default(),
            font_size: DEFAULT_FONT_SIZE,
            language_mode: ExplainLevel::default(),
            max_history_items: DEFAULT_MAX_HISTORY_ITEMS,
        }
    }
}

/// Partial update; unset fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub theme: Option<Theme>,
    pub font_size: Option<u32>,
    pub language_mode: Option<ExplainLevel>,
    pub max_history_items: Option<usize>,
}

/// Redact a credential down to a short prefix for diagnostics.
/// The full key must never reach the logs.
pub fn redact_key(api_key: &str) -> String {
    if api_key.is_empty() {
        return "<unset>".to_string();
    }
    let prefix: String = api_key.chars().take(4).collect();
    format!("{prefix}…")
}

/// Typed accessor over the key-value store for the settings schema,
/// keeping an in-memory mirror of the last loaded/written state.
pub struct SettingsRepository {
    store: Arc<dyn KeyValueStore>,
    mirror: RwLock<Settings>,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            mirror: RwLock::new(Settings::default()),
        }
    }

    /// Read every field from the store, substituting defaults for
    /// missing or wrongly-typed values, and refresh the mirror.
    pub async fn load(&self) -> Result<Settings, StorageError> {
        let api_key = self
            .store
            .get(keys::API_KEY)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let theme = self
            .store
            .get(keys::THEME)
            .await?
            .and_then(|v| v.as_str().map(|s| s.parse().unwrap_or_default()))
            .unwrap_or_default();

        let font_size = self
            .store
            .get(keys::FONT_SIZE)
            .await?
            .and_then(|v| v.as_u64())
            .map(|n| n as u32)
            .unwrap_or(DEFAULT_FONT_SIZE);

        let language_mode = self
            .store
            .get(keys::LANGUAGE_MODE)
            .await?
            .and_then(|v| v.as_str().map(|s| s.parse().unwrap_or_default()))
            .unwrap_or_default();

        let max_history_items = self
            .store
            .get(keys::MAX_HISTORY_ITEMS)
            .await?
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_HISTORY_ITEMS);

        let settings = Settings {
            api_key,
            theme,
            font_size,
            language_mode,
            max_history_items,
        };

        debug!(
            api_key = %redact_key(&settings.api_key),
            theme = %settings.theme,
            language_mode = %settings.language_mode,
            max_history_items = settings.max_history_items,
            "settings loaded"
        );

        *self.mirror.write() = settings.clone();
        Ok(settings)
    }

    /// Last loaded/written state, without touching the store.
    pub fn current(&self) -> Settings {
        self.mirror.read().clone()
    }

    pub async fn update_api_key(&self, api_key: &str) -> Result<(), StorageError> {
        self.store.set(keys::API_KEY, json!(api_key)).await?;
        self.mirror.write().api_key = api_key.to_string();
        info!(api_key = %redact_key(api_key), "API key updated");
        Ok(())
    }

    pub async fn update_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.store.set(keys::THEME, json!(theme.to_string())).await?;
        self.mirror.write().theme = theme;
        Ok(())
    }

    pub async fn update_font_size(&self, font_size: u32) -> Result<(), StorageError> {
        self.store.set(keys::FONT_SIZE, json!(font_size)).await?;
        self.mirror.write().font_size = font_size;
        Ok(())
    }

    pub async fn update_language_mode(&self, mode: ExplainLevel) -> Result<(), StorageError> {
        self.store
            .set(keys::LANGUAGE_MODE, json!(mode.to_string()))
            .await?;
        self.mirror.write().language_mode = mode;
        Ok(())
    }

    pub async fn update_max_history_items(&self, max: usize) -> Result<(), StorageError> {
        self.store.set(keys::MAX_HISTORY_ITEMS, json!(max)).await?;
        self.mirror.write().max_history_items = max;
        Ok(())
    }

    /// Apply a partial update: one store write per set field (the store
    /// has no cross-key transaction; a crash mid-update can leave the
    /// record partially written), then a single mirror swap so readers
    /// never observe a half-applied record.
    pub async fn update_all(&self, patch: SettingsPatch) -> Result<(), StorageError> {
        if let Some(ref api_key) = patch.api_key {
            self.store.set(keys::API_KEY, json!(api_key)).await?;
        }
        if let Some(theme) = patch.theme {
            self.store.set(keys::THEME, json!(theme.to_string())).await?;
        }
        if let Some(font_size) = patch.font_size {
            self.store.set(keys::FONT_SIZE, json!(font_size)).await?;
        }
        if let Some(mode) = patch.language_mode {
            self.store
                .set(keys::LANGUAGE_MODE, json!(mode.to_string()))
                .await?;
        }
        if let Some(max) = patch.max_history_items {
            self.store.set(keys::MAX_HISTORY_ITEMS, json!(max)).await?;
        }

        let mut mirror = self.mirror.write();
        if let Some(api_key) = patch.api_key {
            mirror.api_key = api_key;
        }
        if let Some(theme) = patch.theme {
            mirror.theme = theme;
        }
        if let Some(font_size) = patch.font_size {
            mirror.font_size = font_size;
        }
        if let Some(mode) = patch.language_mode {
            mirror.language_mode = mode;
        }
        if let Some(max) = patch.max_history_items {
            mirror.max_history_items = max;
        }
        Ok(())
    }
}

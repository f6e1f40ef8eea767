//! Translation history: a bounded, newest-first log stored as one JSON
//! array under a single key. Read-modify-write on `add` assumes a single
//! in-flight writer (the UI issues at most one run/add cycle at a time);
//! two concurrent writers race last-write-wins on the full-list overwrite.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::settings::SettingsRepository;
use crate::storage::{keys, KeyValueStore, StorageError};

/// One persisted input/output pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub original_text: String,
    pub translated_text: String,
    /// Detected language label of the input, when the UI supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Caller-supplied fields for a new entry; id/timestamp are assigned here.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub original_text: String,
    pub translated_text: String,
    pub language: Option<String>,
}

#[derive(Debug)]
pub enum HistoryError {
    /// Required fields were empty.
    Validation(String),
    Storage(StorageError),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Validation(msg) => write!(f, "invalid history entry: {msg}"),
            HistoryError::Storage(e) => write!(f, "history storage error: {e}"),
        }
    }
}

impl From<StorageError> for HistoryError {
    fn from(e: StorageError) -> Self {
        HistoryError::Storage(e)
    }
}

/// Process-local sequence so two entries created in the same millisecond
/// still get distinct, ordered ids.
static ENTRY_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_entry_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = ENTRY_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("history-{millis}-{seq:04}")
}

pub struct HistoryRepository {
    store: Arc<dyn KeyValueStore>,
    settings: Arc<SettingsRepository>,
}

impl HistoryRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, settings: Arc<SettingsRepository>) -> Self {
        Self { store, settings }
    }

    async fn read_list(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        match self.store.get(keys::HISTORY).await? {
            Some(value) => {
                let entries = serde_json::from_value(value).map_err(|e| {
                    HistoryError::Storage(StorageError::Io(format!("corrupt history list: {e}")))
                })?;
                Ok(entries)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn write_list(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        let value = serde_json::to_value(entries).map_err(|e| {
            HistoryError::Storage(StorageError::Io(format!("serialize history list: {e}")))
        })?;
        self.store.set(keys::HISTORY, value).await?;
        Ok(())
    }

    /// Assign id/timestamp, prepend, truncate to the current cap, and
    /// persist the whole list in one write. Returns the stored entry.
    pub async fn add(&self, new: NewHistoryEntry) -> Result<HistoryEntry, HistoryError> {
        if new.original_text.is_empty() {
            return Err(HistoryError::Validation("originalText is empty".into()));
        }
        if new.translated_text.is_empty() {
            return Err(HistoryError::Validation("translatedText is empty".into()));
        }

        let cap = self.settings.load().await?.max_history_items;

        let entry = HistoryEntry {
            id: next_entry_id(),
            original_text: new.original_text,
            translated_text: new.translated_text,
            language: new.language,
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_favorite: false,
        };

        let mut entries = self.read_list().await?;
        entries.insert(0, entry.clone());
        if entries.len() > cap {
            let dropped = entries.len() - cap;
            entries.truncate(cap);
            debug!(dropped, cap, "history evicted oldest entries");
        }
        self.write_list(&entries).await?;

        debug!(id = %entry.id, total = entries.len(), "history entry added");
        Ok(entry)
    }

    /// Newest-first list; empty if nothing stored.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        self.read_list().await
    }

    /// Remove by id. No error when the id is absent.
    pub async fn remove(&self, id: &str) -> Result<(), HistoryError> {
        let mut entries = self.read_list().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() != before {
            self.write_list(&entries).await?;
        }
        Ok(())
    }

    /// Delete the underlying key entirely.
    pub async fn clear(&self) -> Result<(), HistoryError> {
        self.store.remove(keys::HISTORY).await?;
        info!("history cleared");
        Ok(())
    }

    /// Flip the favorite flag on one entry and persist the full updated
    /// list. Returns the new flag value, or None if the id is unknown.
    pub async fn toggle_favorite(&self, id: &str) -> Result<Option<bool>, HistoryError> {
        let mut entries = self.read_list().await?;
        let mut toggled = None;
        for entry in &mut entries {
            if entry.id == id {
                entry.is_favorite = !entry.is_favorite;
                toggled = Some(entry.is_favorite);
                break;
            }
        }
        if toggled.is_some() {
            self.write_list(&entries).await?;
        }
        Ok(toggled)
    }

    /// Case-insensitive substring match over original text, translated
    /// text, and the language label. Empty query returns the full list.
    pub async fn search(&self, query: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.read_list().await?;
        if query.is_empty() {
            return Ok(entries);
        }
        let needle = query.to_lowercase();
        Ok(entries
            .into_iter()
            .filter(|e| {
                e.original_text.to_lowercase().contains(&needle)
                    || e.translated_text.to_lowercase().contains(&needle)
                    || e.language
                        .as_deref()
                        .is_some_and(|l| l.to_lowercase().contains(&needle))
            })
            .collect())
    }

    pub async fn favorites(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.read_list().await?;
        Ok(entries.into_iter().filter(|e| e.is_favorite).collect())
    }
}

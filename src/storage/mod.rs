//! Key-value persistence abstraction.
//! Repositories serialize their records to JSON values under fixed keys;
//! the backing store is swappable (SQLite in production, in-memory for tests).

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage keys used across the crate. Kept in one place so the
/// persisted layout is visible at a glance.
pub mod keys {
    pub const API_KEY: &str = "apiKey";
    pub const THEME: &str = "theme";
    pub const FONT_SIZE: &str = "fontSize";
    pub const LANGUAGE_MODE: &str = "languageMode";
    pub const MAX_HISTORY_ITEMS: &str = "maxHistoryItems";
    pub const HISTORY: &str = "history";
    pub const LAST_INPUT: &str = "lastInput";
    pub const LAST_OUTPUT: &str = "lastOutput";
}

#[derive(Debug)]
pub enum StorageError {
    /// The backing service is not present at all.
    Unavailable,
    /// The backing service rejected the operation.
    Io(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Unavailable => write!(f, "storage backend unavailable"),
            StorageError::Io(msg) => write!(f, "storage IO error: {msg}"),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

/// Async persistent key-value store.
/// `get` of a missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
    async fn get_all(&self) -> Result<HashMap<String, Value>, StorageError>;
}

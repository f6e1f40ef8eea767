//! Session-continuity cache: the last input/output pair the popup showed,
//! so reopening restores the previous view. Written by the presentation
//! layer after a run; the orchestrator never touches it.

use std::sync::Arc;

use serde_json::json;

use crate::storage::{keys, KeyValueStore, StorageError};

pub struct SessionCache {
    store: Arc<dyn KeyValueStore>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, input: &str, output: &str) -> Result<(), StorageError> {
        self.store.set(keys::LAST_INPUT, json!(input)).await?;
        self.store.set(keys::LAST_OUTPUT, json!(output)).await?;
        Ok(())
    }

    /// Returns (last input, last output); either may be absent.
    pub async fn load(&self) -> Result<(Option<String>, Option<String>), StorageError> {
        let input = self
            .store
            .get(keys::LAST_INPUT)
            .await?
            .and_then(|v| v.as_str().map(str::to_string));
        let output = self
            .store
            .get(keys::LAST_OUTPUT)
            .await?
            .and_then(|v| v.as_str().map(str::to_string));
        Ok((input, output))
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(keys::LAST_INPUT).await?;
        self.store.remove(keys::LAST_OUTPUT).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn save_load_clear() {
        let cache = SessionCache::new(Arc::new(MemoryStore::new()));
        assert_eq!(cache.load().await.unwrap(), (None, None));

        cache.save("some code", "an explanation").await.unwrap();
        let (input, output) = cache.load().await.unwrap();
        assert_eq!(input.as_deref(), Some("some code"));
        assert_eq!(output.as_deref(), Some("an explanation"));

        cache.clear().await.unwrap();
        assert_eq!(cache.load().await.unwrap(), (None, None));
    }
}

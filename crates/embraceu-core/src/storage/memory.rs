//! In-process storage backend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{normalize_key, KeyValueStore};
use crate::Result;

/// Map-backed storage. Clones share the same map, so reopening a queue over a
/// clone behaves like a page reload against the same storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = normalize_key(key)?;
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = normalize_key(key)?;
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = normalize_key(key)?;
        self.values.lock().await.remove(key);
        Ok(())
    }
}

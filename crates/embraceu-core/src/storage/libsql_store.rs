//! libSQL-backed storage using the `kv_store` table.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{normalize_key, KeyValueStore};
use crate::db::Database;
use crate::Result;

/// Thread-safe key/value store over a local libSQL database.
#[derive(Clone)]
pub struct LibSqlStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlStore {
    /// Open a store at the given filesystem path, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::debug!("Opened offline storage at {}", db_path.display());
        Ok(Self::from_database(db))
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory().await?))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }
}

impl KeyValueStore for LibSqlStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = normalize_key(key)?;
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query("SELECT value FROM kv_store WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = normalize_key(key)?;
        let updated_at = crate::util::unix_timestamp_millis().to_string();
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, CAST(? AS INTEGER))",
                [key, value, updated_at.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = normalize_key(key)?;
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM kv_store WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

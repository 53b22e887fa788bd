//! Persisted key/value storage used as the offline queue's durability medium.

mod file;
mod libsql_store;
mod memory;

use std::future::Future;

use crate::{Error, Result};

pub use file::FileStore;
pub use libsql_store::LibSqlStore;
pub use memory::MemoryStore;

/// String key/value storage the queue serializes its state into.
///
/// Implementations must have completed the write by the time `set` or
/// `remove` resolves; callers treat a resolved write as durable.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove `key`; removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Validate a storage key so every backend can map it onto its own namespace.
pub(crate) fn normalize_key(key: &str) -> Result<&str> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidInput("storage key cannot be empty".to_string()));
    }
    if !key
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
    {
        return Err(Error::InvalidInput(format!(
            "storage key '{key}' may only contain ASCII letters, digits, '_', '-' and '.'"
        )));
    }
    if key.starts_with('.') {
        return Err(Error::InvalidInput(format!(
            "storage key '{key}' cannot start with '.'"
        )));
    }
    Ok(key)
}

fn storage_error(operation: &str, key: &str, error: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{operation} failed for key '{key}': {error}"))
}

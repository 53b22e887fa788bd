//! Queued write model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Destination, JsonObject};

/// A unique identifier for a queued write, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A pending write awaiting delivery to the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEntry {
    /// Unique identifier assigned at enqueue time
    pub id: EntryId,
    /// Destination table
    pub table: Destination,
    /// Record written verbatim to the destination
    pub data: JsonObject,
    /// Client clock at enqueue (Unix ms)
    pub timestamp: i64,
    /// Failed replay attempts so far
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedEntry {
    /// Create a new entry stamped with the current time
    #[must_use]
    pub fn new(table: Destination, data: JsonObject) -> Self {
        Self {
            id: EntryId::new(),
            table,
            data,
            timestamp: crate::util::unix_timestamp_millis(),
            attempts: 0,
        }
    }
}

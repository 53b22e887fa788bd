//! embraceu-core - Core library for EmbraceU
//!
//! This crate contains the offline-first write path shared by EmbraceU
//! clients: the connectivity monitor, the durable offline write queue, the
//! key/value storage backends it persists into, and the Supabase insert
//! client it replays against.

pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod remote;
pub mod state;
pub mod storage;
pub mod util;

pub use error::{Error, Result};
pub use models::{Destination, EntryId, QueuedEntry, WellnessRecord};
pub use queue::{OfflineQueue, QueueConfig, QueueNotice, SaveOutcome, SyncReport};

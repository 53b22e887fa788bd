//! Results and user-facing notices produced by the offline queue.

use std::fmt;

use serde::Serialize;

use crate::models::{Destination, EntryId};

/// Informational, non-blocking message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueNotice {
    SavedLocally {
        entry_id: EntryId,
        destination: Destination,
    },
    Synced {
        count: usize,
    },
    SyncFailed {
        count: usize,
    },
    DeadLettered {
        count: usize,
    },
}

impl fmt::Display for QueueNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SavedLocally { .. } => f.write_str("Saved locally, will sync when possible"),
            Self::Synced { count } => write!(f, "Synced {count} {}", entries_word(*count)),
            Self::SyncFailed { count } => {
                write!(f, "Failed to sync {count} {}", entries_word(*count))
            }
            Self::DeadLettered { count } => write!(
                f,
                "Stopped retrying {count} {} after repeated failures",
                entries_word(*count)
            ),
        }
    }
}

const fn entries_word(count: usize) -> &'static str {
    if count == 1 {
        "entry"
    } else {
        "entries"
    }
}

/// What happened to a save from the caller's point of view. A save never
/// fails; it is either written now or durably queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub queued: bool,
    pub entry_id: Option<EntryId>,
}

impl SaveOutcome {
    pub const fn written() -> Self {
        Self {
            queued: false,
            entry_id: None,
        }
    }

    pub const fn queued(entry_id: EntryId) -> Self {
        Self {
            queued: true,
            entry_id: Some(entry_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadySyncing,
}

/// Summary of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Entries delivered and removed from the queue
    pub synced: usize,
    /// Entries whose attempt failed in this pass (including dead-lettered ones)
    pub failed: usize,
    /// Failed entries moved to the dead-letter list
    pub dead_lettered: usize,
    /// Entries left in the queue after the pass
    pub remaining: usize,
    /// Set when the pass did not run
    pub skipped: Option<SkipReason>,
}

impl SyncReport {
    pub(crate) fn skipped(reason: SkipReason, remaining: usize) -> Self {
        Self {
            remaining,
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub const fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub const fn attempted(&self) -> usize {
        self.synced + self.failed
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.skipped {
            Some(SkipReason::Offline) => {
                return write!(f, "Offline; {} entries still pending", self.remaining)
            }
            Some(SkipReason::AlreadySyncing) => return f.write_str("Sync already in progress"),
            None => {}
        }
        if self.attempted() == 0 {
            return f.write_str("Nothing to sync");
        }
        write!(
            f,
            "Synced {}, failed {}, dead-lettered {}, remaining {}",
            self.synced, self.failed, self.dead_lettered, self.remaining
        )
    }
}

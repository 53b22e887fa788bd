//! Shared cross-platform state types.

use serde::Serialize;

/// Unified sync state shown by clients next to the pending counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    Pending,
    Synced,
}

impl SyncState {
    /// Collapse the queue's observable flags into a single display state.
    pub const fn derive(is_online: bool, is_syncing: bool, pending: usize) -> Self {
        if !is_online {
            Self::Offline
        } else if is_syncing {
            Self::Syncing
        } else if pending > 0 {
            Self::Pending
        } else {
            Self::Synced
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

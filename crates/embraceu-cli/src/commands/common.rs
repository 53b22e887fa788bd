use std::path::{Path, PathBuf};
use std::sync::Arc;

use embraceu_core::connectivity::{ConnectivityMonitor, HttpProbe};
use embraceu_core::models::JsonObject;
use embraceu_core::remote::{RemoteError, RemoteResult, RemoteStore, SupabaseRestStore};
use embraceu_core::storage::LibSqlStore;
use embraceu_core::util::unix_timestamp_millis;
use embraceu_core::{Destination, OfflineQueue, QueueConfig, QueuedEntry};
use serde::Serialize;

use crate::config::CliConfig;
use crate::error::CliError;

const STORE_FILE_NAME: &str = "offline.db";

/// Remote used by the CLI. Without Supabase settings every insert fails,
/// which the queue treats as "retry later".
#[derive(Debug)]
pub enum CliRemote {
    Supabase(SupabaseRestStore),
    LocalOnly,
}

impl CliRemote {
    pub fn from_config(config: &CliConfig) -> Result<Self, CliError> {
        match (&config.supabase_url, &config.supabase_anon_key) {
            (Some(url), Some(anon_key)) => Ok(Self::Supabase(
                SupabaseRestStore::new(url, anon_key.clone())?
                    .with_access_token(config.access_token.clone()),
            )),
            _ => Ok(Self::LocalOnly),
        }
    }

    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Supabase(_))
    }
}

impl RemoteStore for CliRemote {
    async fn insert(&self, destination: Destination, record: &JsonObject) -> RemoteResult<()> {
        match self {
            Self::Supabase(store) => store.insert(destination, record).await,
            Self::LocalOnly => Err(RemoteError::NotConfigured),
        }
    }
}

pub type CliQueue = OfflineQueue<LibSqlStore, CliRemote>;

/// How the connectivity monitor is seeded when a command opens the queue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Connectivity {
    /// Start offline; nothing touches the network
    Offline,
    /// Probe the configured health URL once
    Detect,
}

pub fn resolve_store_path(data_dir: Option<&Path>) -> PathBuf {
    data_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(default_data_dir)
        .join(STORE_FILE_NAME)
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("embraceu")
}

pub fn build_probe(config: &CliConfig) -> Result<Option<HttpProbe>, CliError> {
    config
        .resolved_probe_url()
        .map(|url| HttpProbe::new(url).map_err(|error| CliError::Remote(error.into())))
        .transpose()
}

pub async fn open_queue(
    config: &CliConfig,
    store_path: &Path,
    connectivity: Connectivity,
) -> Result<Arc<CliQueue>, CliError> {
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let storage = LibSqlStore::open_path(store_path).await?;
    let remote = CliRemote::from_config(config)?;

    let monitor = match (connectivity, remote.is_configured()) {
        (Connectivity::Detect, true) => match build_probe(config)? {
            Some(probe) => ConnectivityMonitor::detect(&probe).await,
            None => ConnectivityMonitor::new(false),
        },
        _ => ConnectivityMonitor::new(false),
    };

    let queue_config = QueueConfig {
        max_attempts: config.queue_max_attempts(),
        ..QueueConfig::default()
    };
    let queue = OfflineQueue::open(storage, remote, Arc::new(monitor), queue_config).await;
    Ok(Arc::new(queue))
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub table: Destination,
    pub timestamp: i64,
    pub relative_time: String,
    pub attempts: u32,
    pub data: JsonObject,
}

pub fn entry_to_list_item(entry: &QueuedEntry) -> EntryListItem {
    EntryListItem {
        id: entry.id.to_string(),
        table: entry.table,
        timestamp: entry.timestamp,
        relative_time: format_relative_time(entry.timestamp, unix_timestamp_millis()),
        attempts: entry.attempts,
        data: entry.data.clone(),
    }
}

pub fn format_entry_lines(entries: &[QueuedEntry]) -> Vec<String> {
    let now = unix_timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let payload = serde_json::Value::Object(entry.data.clone()).to_string();
            format!(
                "{}  {:<18} {:>9}  tries:{}  {}",
                entry.id,
                entry.table.as_str(),
                format_relative_time(entry.timestamp, now),
                entry.attempts,
                data_preview(&payload, 48)
            )
        })
        .collect()
}

pub fn data_preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated = collapsed
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

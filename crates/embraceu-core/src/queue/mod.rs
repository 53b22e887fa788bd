//! Offline write queue.
//!
//! Writes go straight to the remote store when the client is online. When
//! offline, or when the direct write fails, the record is appended to a FIFO
//! queue persisted in a [`KeyValueStore`] and replayed on the next sync pass.
//! Entries leave the queue only when their remote write succeeds (or when
//! they exhaust `max_attempts` and move to the dead-letter list).
//!
//! One `OfflineQueue` owns a storage key at a time. Two instances over the
//! same key (another process, another device profile) are not coordinated
//! and will overwrite each other's view of the queue.

mod notice;
#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::connectivity::{ConnectivityMonitor, ConnectivityTransition};
use crate::models::{Destination, EntryId, JsonObject, QueuedEntry, WellnessRecord};
use crate::remote::RemoteStore;
use crate::state::SyncState;
use crate::storage::KeyValueStore;
use crate::Result;

pub use notice::{QueueNotice, SaveOutcome, SkipReason, SyncReport};

/// Storage key the queue is persisted under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "offline_sync_queue";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Key holding the JSON array of pending entries
    pub storage_key: String,
    /// Failed replays before an entry is dead-lettered; `None` retries forever
    pub max_attempts: Option<u32>,
    /// Buffered notices per subscriber before old ones are dropped
    pub notice_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

impl QueueConfig {
    pub fn dead_letter_key(&self) -> String {
        format!("{}.dead_letter", self.storage_key)
    }
}

/// Point-in-time view of the queue for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub is_online: bool,
    pub was_offline: bool,
    pub is_syncing: bool,
    pub pending: usize,
    pub state: SyncState,
}

/// Durable FIFO of writes waiting for the remote store.
pub struct OfflineQueue<S, R> {
    storage: S,
    remote: R,
    monitor: Arc<ConnectivityMonitor>,
    config: QueueConfig,
    entries: Mutex<Vec<QueuedEntry>>,
    syncing: AtomicBool,
    pending: watch::Sender<usize>,
    notices: broadcast::Sender<QueueNotice>,
}

impl<S: KeyValueStore, R: RemoteStore> OfflineQueue<S, R> {
    /// Load the persisted queue and build the service.
    ///
    /// Never fails: unreadable or corrupt state is logged, quarantined and
    /// replaced by an empty queue.
    pub async fn open(
        storage: S,
        remote: R,
        monitor: Arc<ConnectivityMonitor>,
        config: QueueConfig,
    ) -> Self {
        let entries = load_entries(&storage, &config).await;
        tracing::info!(
            "Loaded offline queue '{}' with {} pending entries",
            config.storage_key,
            entries.len()
        );

        let (pending, _) = watch::channel(entries.len());
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        Self {
            storage,
            remote,
            monitor,
            config,
            entries: Mutex::new(entries),
            syncing: AtomicBool::new(false),
            pending,
            notices,
        }
    }

    /// Write `data` to `destination`, immediately when possible, otherwise
    /// through the queue. Always succeeds from the caller's point of view.
    pub async fn save_with_offline_support(
        &self,
        destination: Destination,
        data: JsonObject,
    ) -> SaveOutcome {
        if self.monitor.is_online() {
            match self.remote.insert(destination, &data).await {
                Ok(()) => {
                    tracing::debug!("Wrote record to {destination} directly");
                    return SaveOutcome::written();
                }
                Err(error) => {
                    tracing::warn!("Direct write to {destination} failed, queueing: {error}");
                }
            }
        } else {
            tracing::debug!("Offline, queueing record for {destination}");
        }

        let entry_id = self.enqueue(QueuedEntry::new(destination, data)).await;
        SaveOutcome::queued(entry_id)
    }

    /// Typed variant of [`Self::save_with_offline_support`]. Only fails when
    /// the record cannot be turned into a JSON object.
    pub async fn save_record(&self, record: impl Into<WellnessRecord>) -> Result<SaveOutcome> {
        let (destination, data) = record.into().into_parts()?;
        Ok(self.save_with_offline_support(destination, data).await)
    }

    /// Replay the queue in insertion order.
    ///
    /// No-op while offline or while another pass is running.
    pub async fn sync_queue(&self) -> SyncReport {
        if !self.monitor.is_online() {
            tracing::debug!("Skipping sync while offline");
            return SyncReport::skipped(SkipReason::Offline, self.pending_count());
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync already in progress");
            return SyncReport::skipped(SkipReason::AlreadySyncing, self.pending_count());
        }
        let _syncing = SyncingGuard(&self.syncing);

        let snapshot = self.entries.lock().await.clone();
        if snapshot.is_empty() {
            return SyncReport::default();
        }
        tracing::info!("Syncing {} queued entries", snapshot.len());

        let mut synced = HashSet::new();
        let mut failed = HashSet::new();
        for entry in &snapshot {
            match self.remote.insert(entry.table, &entry.data).await {
                Ok(()) => {
                    tracing::debug!("Synced entry {} to {}", entry.id, entry.table);
                    synced.insert(entry.id);
                }
                Err(error) => {
                    tracing::warn!("Failed to sync entry {} to {}: {error}", entry.id, entry.table);
                    failed.insert(entry.id);
                }
            }
        }

        let (remaining, dead_lettered) = {
            let mut entries = self.entries.lock().await;
            // Entries enqueued during the pass are not in either set and stay put.
            entries.retain(|entry| !synced.contains(&entry.id));
            for entry in entries.iter_mut().filter(|entry| failed.contains(&entry.id)) {
                entry.attempts = entry.attempts.saturating_add(1);
            }
            let dead_lettered = self.dead_letter_exhausted(&mut entries, &failed).await;
            self.persist(&entries).await;
            (entries.len(), dead_lettered)
        };

        let report = SyncReport {
            synced: synced.len(),
            failed: failed.len(),
            dead_lettered,
            remaining,
            skipped: None,
        };
        tracing::info!("Sync pass finished: {report}");

        if report.synced > 0 {
            self.notify(QueueNotice::Synced {
                count: report.synced,
            });
        }
        if report.failed > 0 {
            self.notify(QueueNotice::SyncFailed {
                count: report.failed,
            });
        }
        if report.dead_lettered > 0 {
            self.notify(QueueNotice::DeadLettered {
                count: report.dead_lettered,
            });
        }
        report
    }

    /// Run [`Self::sync_queue`] once for every offline→online transition the
    /// monitor reports. Transitions that arrive while a pass is running are
    /// dropped rather than replayed afterwards. Dropping the handle stops the
    /// task.
    pub fn spawn_auto_sync(self: &Arc<Self>) -> AutoSyncHandle {
        let mut transitions = self.monitor.subscribe();
        let queue = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match transitions.recv().await {
                    Ok(ConnectivityTransition::WentOnline) => {
                        queue.sync_queue().await;
                        discard_buffered(&mut transitions);
                    }
                    Ok(ConnectivityTransition::WentOffline) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Auto-sync missed {missed} connectivity transitions");
                        queue.sync_queue().await;
                        discard_buffered(&mut transitions);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        AutoSyncHandle { task }
    }

    /// Entries that exhausted their retries, oldest first.
    ///
    /// A corrupt dead-letter list is quarantined and reads as empty.
    pub async fn dead_letters(&self) -> Result<Vec<QueuedEntry>> {
        load_list(&self.storage, &self.config.dead_letter_key()).await
    }

    /// Move every dead letter back to the tail of the queue with its attempt
    /// counter reset. Returns how many were requeued.
    pub async fn requeue_dead_letters(&self) -> Result<usize> {
        let key = self.config.dead_letter_key();
        let mut entries = self.entries.lock().await;
        let dead = load_list(&self.storage, &key).await?;
        if dead.is_empty() {
            return Ok(0);
        }

        let count = dead.len();
        let mut updated = entries.clone();
        updated.extend(dead.into_iter().map(|mut entry| {
            entry.attempts = 0;
            entry
        }));
        write_entries(&self.storage, &self.config.storage_key, &updated).await?;
        *entries = updated;
        self.pending.send_replace(entries.len());
        self.storage.remove(&key).await?;

        tracing::info!("Requeued {count} dead-lettered entries");
        Ok(count)
    }

    /// Drop every dead letter. Returns how many were discarded.
    pub async fn discard_dead_letters(&self) -> Result<usize> {
        let key = self.config.dead_letter_key();
        let _entries = self.entries.lock().await;
        let count = load_list(&self.storage, &key).await?.len();
        self.storage.remove(&key).await?;
        tracing::info!("Discarded {count} dead-lettered entries");
        Ok(count)
    }

    /// Snapshot of the pending entries in replay order.
    pub async fn pending_entries(&self) -> Vec<QueuedEntry> {
        self.entries.lock().await.clone()
    }

    pub fn pending_count(&self) -> usize {
        *self.pending.borrow()
    }

    /// Watch the pending counter.
    pub fn subscribe_pending(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<QueueNotice> {
        self.notices.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn status(&self) -> QueueStatus {
        let is_online = self.monitor.is_online();
        let is_syncing = self.is_syncing();
        let pending = self.pending_count();
        QueueStatus {
            is_online,
            was_offline: self.monitor.was_offline(),
            is_syncing,
            pending,
            state: SyncState::derive(is_online, is_syncing, pending),
        }
    }

    pub const fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn enqueue(&self, entry: QueuedEntry) -> EntryId {
        let entry_id = entry.id;
        let destination = entry.table;
        {
            let mut entries = self.entries.lock().await;
            entries.push(entry);
            self.persist(&entries).await;
        }
        self.notify(QueueNotice::SavedLocally {
            entry_id,
            destination,
        });
        entry_id
    }

    /// Move entries that failed in this pass and reached `max_attempts` to
    /// the dead-letter list. They stay queued if that write fails.
    async fn dead_letter_exhausted(
        &self,
        entries: &mut Vec<QueuedEntry>,
        failed: &HashSet<EntryId>,
    ) -> usize {
        let Some(max_attempts) = self.config.max_attempts else {
            return 0;
        };

        let exhausted: Vec<QueuedEntry> = entries
            .iter()
            .filter(|entry| failed.contains(&entry.id) && entry.attempts >= max_attempts)
            .cloned()
            .collect();
        if exhausted.is_empty() {
            return 0;
        }
        let exhausted_ids: HashSet<EntryId> = exhausted.iter().map(|entry| entry.id).collect();

        let key = self.config.dead_letter_key();
        let appended = match load_list(&self.storage, &key).await {
            Ok(mut dead) => {
                dead.extend(exhausted);
                write_entries(&self.storage, &key, &dead).await
            }
            Err(error) => Err(error),
        };
        if let Err(error) = appended {
            tracing::error!(
                "Failed to dead-letter {} entries, keeping them queued: {error}",
                exhausted_ids.len()
            );
            return 0;
        }

        entries.retain(|entry| !exhausted_ids.contains(&entry.id));
        tracing::warn!(
            "Dead-lettered {} entries after {max_attempts} failed attempts",
            exhausted_ids.len()
        );
        exhausted_ids.len()
    }

    async fn persist(&self, entries: &[QueuedEntry]) {
        self.pending.send_replace(entries.len());
        if let Err(error) = write_entries(&self.storage, &self.config.storage_key, entries).await {
            tracing::error!(
                "Failed to persist offline queue ({} entries): {error}",
                entries.len()
            );
        }
    }

    fn notify(&self, notice: QueueNotice) {
        tracing::info!("{notice}");
        // Nobody listening is fine; the notice is informational.
        let _ = self.notices.send(notice);
    }
}

/// Running auto-sync task; dropping the handle stops it.
#[derive(Debug)]
pub struct AutoSyncHandle {
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AutoSyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn write_entries<S: KeyValueStore>(
    storage: &S,
    key: &str,
    entries: &[QueuedEntry],
) -> Result<()> {
    let raw = serde_json::to_string(entries)?;
    storage.set(key, &raw).await
}

/// Load the persisted queue, failing open.
async fn load_entries<S: KeyValueStore>(storage: &S, config: &QueueConfig) -> Vec<QueuedEntry> {
    let key = config.storage_key.as_str();
    match load_list(storage, key).await {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!("Failed to read offline queue '{key}', starting empty: {error}");
            Vec::new()
        }
    }
}

/// Read the entry list stored under `key`.
///
/// A value that is not a JSON array is quarantined whole and the key is
/// cleared. Inside a valid array, entries that do not parse are quarantined
/// and the rest are kept and written back. Only storage failures are errors.
async fn load_list<S: KeyValueStore>(storage: &S, key: &str) -> Result<Vec<QueuedEntry>> {
    let Some(raw) = storage.get(key).await? else {
        tracing::debug!("Nothing persisted under '{key}' yet");
        return Ok(Vec::new());
    };

    let values = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
        Ok(values) => values,
        Err(error) => {
            tracing::warn!("Entry list '{key}' is corrupt, treating it as empty: {error}");
            if quarantine(storage, key, &raw).await {
                if let Err(error) = storage.remove(key).await {
                    tracing::error!("Failed to clear corrupt entry list '{key}': {error}");
                }
            }
            return Ok(Vec::new());
        }
    };

    let mut entries = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for value in values {
        match serde_json::from_value::<QueuedEntry>(value.clone()) {
            Ok(entry) => entries.push(entry),
            Err(error) => {
                tracing::warn!("Skipping malformed entry in '{key}': {error}");
                rejected.push(value);
            }
        }
    }

    if !rejected.is_empty() {
        quarantine(storage, key, &serde_json::Value::Array(rejected).to_string()).await;
        if let Err(error) = write_entries(storage, key, &entries).await {
            tracing::error!("Failed to rewrite '{key}' after quarantine: {error}");
        }
    }
    Ok(entries)
}

/// Copy unreadable data under `key` to `{key}.corrupt-<unix_ms>`.
async fn quarantine<S: KeyValueStore>(storage: &S, key: &str, raw: &str) -> bool {
    let quarantine_key = format!("{key}.corrupt-{}", crate::util::unix_timestamp_millis());
    match storage.set(&quarantine_key, raw).await {
        Ok(()) => {
            tracing::warn!("Moved unreadable data from '{key}' to '{quarantine_key}'");
            true
        }
        Err(error) => {
            tracing::error!("Failed to quarantine unreadable data to '{quarantine_key}': {error}");
            false
        }
    }
}

/// Drop transitions that queued up while a pass was running.
fn discard_buffered(transitions: &mut broadcast::Receiver<ConnectivityTransition>) {
    let mut dropped = 0_usize;
    loop {
        match transitions.try_recv() {
            Ok(_) => dropped += 1,
            Err(TryRecvError::Lagged(missed)) => {
                dropped = dropped.saturating_add(usize::try_from(missed).unwrap_or(usize::MAX));
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    if dropped > 0 {
        tracing::debug!("Ignored {dropped} connectivity transitions received during a sync pass");
    }
}

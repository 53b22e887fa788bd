use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::{broadcast, Notify};

use super::*;
use crate::models::MoodEntry;
use crate::remote::{RemoteError, RemoteResult};
use crate::storage::MemoryStore;

const NOTICE_TIMEOUT: Duration = Duration::from_secs(5);

fn record(label: &str) -> JsonObject {
    let serde_json::Value::Object(map) = json!({ "label": label }) else {
        unreachable!()
    };
    map
}

fn label_of(data: &JsonObject) -> String {
    data.get("label")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Remote that records every insert and fails on request.
#[derive(Default)]
struct RecordingRemote {
    calls: StdMutex<Vec<(Destination, JsonObject)>>,
    failing_labels: StdMutex<HashSet<String>>,
    fail_all: AtomicBool,
}

impl RecordingRemote {
    fn fail_label(&self, label: &str) {
        self.failing_labels
            .lock()
            .unwrap()
            .insert(label.to_string());
    }

    fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    fn labels(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, data)| label_of(data))
            .collect()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl RemoteStore for RecordingRemote {
    async fn insert(&self, destination: Destination, record: &JsonObject) -> RemoteResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((destination, record.clone()));
        let label = label_of(record);
        if self.fail_all.load(Ordering::SeqCst)
            || self.failing_labels.lock().unwrap().contains(&label)
        {
            return Err(RemoteError::Api {
                status: 500,
                message: "simulated failure (500)".to_string(),
            });
        }
        Ok(())
    }
}

/// Remote whose inserts wait until the test releases them.
#[derive(Default)]
struct GatedRemote {
    entered: Notify,
    release: Notify,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl RemoteStore for GatedRemote {
    async fn insert(&self, _destination: Destination, _record: &JsonObject) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 503,
                message: "simulated outage (503)".to_string(),
            });
        }
        Ok(())
    }
}

type TestQueue<R> = OfflineQueue<MemoryStore, Arc<R>>;

async fn open_queue<R: RemoteStore>(
    storage: &MemoryStore,
    remote: &Arc<R>,
    online: bool,
    config: QueueConfig,
) -> TestQueue<R> {
    OfflineQueue::open(
        storage.clone(),
        Arc::clone(remote),
        Arc::new(ConnectivityMonitor::new(online)),
        config,
    )
    .await
}

async fn persisted_labels(storage: &MemoryStore, key: &str) -> Vec<String> {
    let raw = storage.get(key).await.unwrap().unwrap_or_else(|| "[]".to_string());
    let entries: Vec<QueuedEntry> = serde_json::from_str(&raw).unwrap();
    entries.iter().map(|entry| label_of(&entry.data)).collect()
}

async fn next_notice(notices: &mut broadcast::Receiver<QueueNotice>) -> QueueNotice {
    tokio::time::timeout(NOTICE_TIMEOUT, notices.recv())
        .await
        .expect("timed out waiting for queue notice")
        .expect("notice channel closed")
}

/// Skip notices until one that is not `SavedLocally` arrives.
async fn next_sync_notice(notices: &mut broadcast::Receiver<QueueNotice>) -> QueueNotice {
    loop {
        let notice = next_notice(notices).await;
        if !matches!(notice, QueueNotice::SavedLocally { .. }) {
            return notice;
        }
    }
}

#[tokio::test]
async fn offline_saves_are_counted_and_survive_reload() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    let queue = open_queue(&storage, &remote, false, QueueConfig::default()).await;

    for label in ["a", "b", "c"] {
        let outcome = queue
            .save_with_offline_support(Destination::GratitudeEntries, record(label))
            .await;
        assert!(outcome.queued);
        assert!(outcome.entry_id.is_some());
    }

    assert_eq!(queue.pending_count(), 3);
    assert_eq!(remote.call_count(), 0);
    drop(queue);

    let reloaded = open_queue(&storage, &remote, false, QueueConfig::default()).await;
    assert_eq!(reloaded.pending_count(), 3);
    let labels: Vec<String> = reloaded
        .pending_entries()
        .await
        .iter()
        .map(|entry| label_of(&entry.data))
        .collect();
    assert_eq!(labels, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn concurrent_sync_calls_run_a_single_pass() {
    let storage = MemoryStore::new();
    let remote = Arc::new(GatedRemote::default());
    let queue = Arc::new(open_queue(&storage, &remote, false, QueueConfig::default()).await);

    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;
    queue.monitor().set_online(true);

    let first = tokio::spawn({
        let queue = Arc::clone(&queue);
        async move { queue.sync_queue().await }
    });
    remote.entered.notified().await;
    assert!(queue.is_syncing());

    let second = queue.sync_queue().await;
    assert_eq!(second.skipped, Some(SkipReason::AlreadySyncing));

    remote.release.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.synced, 1);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert!(!queue.is_syncing());
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test]
async fn sync_replays_in_insertion_order() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    let queue = open_queue(&storage, &remote, false, QueueConfig::default()).await;

    for label in ["a", "b", "c"] {
        queue
            .save_with_offline_support(Destination::JournalEntries, record(label))
            .await;
    }
    queue.monitor().set_online(true);

    let report = queue.sync_queue().await;
    assert_eq!(report.synced, 3);
    assert_eq!(remote.labels(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn failed_entry_is_the_only_one_retained() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    remote.fail_label("b");
    let queue = open_queue(&storage, &remote, false, QueueConfig::default()).await;

    for label in ["a", "b", "c"] {
        queue
            .save_with_offline_support(Destination::MoodEntries, record(label))
            .await;
    }
    queue.monitor().set_online(true);

    let report = queue.sync_queue().await;
    assert_eq!(report.synced, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.remaining, 1);
    assert_eq!(remote.labels(), vec!["a", "b", "c"]);
    assert_eq!(
        persisted_labels(&storage, DEFAULT_STORAGE_KEY).await,
        vec!["b"]
    );

    let pending = queue.pending_entries().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[0].data, record("b"));
}

#[tokio::test]
async fn each_reconnect_triggers_one_sync() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    remote.set_fail_all(true);
    let queue = Arc::new(open_queue(&storage, &remote, false, QueueConfig::default()).await);
    let _auto_sync = queue.spawn_auto_sync();

    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;
    let mut notices = queue.subscribe_notices();

    queue.monitor().set_online(true);
    assert_eq!(
        next_sync_notice(&mut notices).await,
        QueueNotice::SyncFailed { count: 1 }
    );
    assert_eq!(remote.call_count(), 1);

    // Same-state event is not a transition.
    queue.monitor().set_online(true);
    queue.monitor().set_online(false);
    queue.monitor().set_online(true);
    assert_eq!(
        next_sync_notice(&mut notices).await,
        QueueNotice::SyncFailed { count: 1 }
    );
    assert_eq!(remote.call_count(), 2);
    assert_eq!(queue.pending_count(), 1);
}

#[tokio::test]
async fn reconnects_during_a_pass_are_ignored() {
    let storage = MemoryStore::new();
    let remote = Arc::new(GatedRemote::default());
    remote.fail.store(true, Ordering::SeqCst);
    let queue = Arc::new(open_queue(&storage, &remote, false, QueueConfig::default()).await);
    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;
    let _auto_sync = queue.spawn_auto_sync();
    let mut notices = queue.subscribe_notices();

    queue.monitor().set_online(true);
    remote.entered.notified().await;
    assert!(queue.is_syncing());

    // Flapping while the pass is blocked inside the remote.
    queue.monitor().set_online(false);
    queue.monitor().set_online(true);
    queue.monitor().set_online(false);
    queue.monitor().set_online(true);
    remote.release.notify_one();

    assert_eq!(
        next_sync_notice(&mut notices).await,
        QueueNotice::SyncFailed { count: 1 }
    );
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }

    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert!(!queue.is_syncing());
    assert_eq!(queue.pending_entries().await[0].attempts, 1);

    // A reconnect after the pass still triggers the next one.
    queue.monitor().set_online(false);
    queue.monitor().set_online(true);
    remote.entered.notified().await;
    remote.release.notify_one();
    assert_eq!(
        next_sync_notice(&mut notices).await,
        QueueNotice::SyncFailed { count: 1 }
    );
    assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
    assert_eq!(queue.pending_entries().await[0].attempts, 2);
}

#[tokio::test]
async fn offline_mood_entry_syncs_after_reconnect() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    let queue = Arc::new(open_queue(&storage, &remote, false, QueueConfig::default()).await);
    let _auto_sync = queue.spawn_auto_sync();
    let mut notices = queue.subscribe_notices();

    let outcome = queue
        .save_record(MoodEntry {
            user_id: None,
            mood: "good".to_string(),
            note: None,
            energy_level: None,
        })
        .await
        .unwrap();
    assert!(outcome.queued);
    assert_eq!(queue.pending_count(), 1);
    assert!(matches!(
        next_notice(&mut notices).await,
        QueueNotice::SavedLocally {
            destination: Destination::MoodEntries,
            ..
        }
    ));

    queue.monitor().set_online(true);
    let notice = next_notice(&mut notices).await;
    assert_eq!(notice, QueueNotice::Synced { count: 1 });
    assert_eq!(notice.to_string(), "Synced 1 entry");
    assert_eq!(queue.pending_count(), 0);

    let calls = remote.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Destination::MoodEntries);
    assert_eq!(calls[0].1.get("mood"), Some(&json!("good")));
}

#[tokio::test]
async fn online_write_failure_is_queued() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    remote.set_fail_all(true);
    let queue = open_queue(&storage, &remote, true, QueueConfig::default()).await;

    let outcome = queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;

    assert!(outcome.queued);
    assert_eq!(remote.call_count(), 1);
    assert_eq!(queue.pending_count(), 1);
    assert_eq!(
        persisted_labels(&storage, DEFAULT_STORAGE_KEY).await,
        vec!["a"]
    );
}

#[tokio::test]
async fn online_write_success_is_not_queued() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    let queue = open_queue(&storage, &remote, true, QueueConfig::default()).await;
    let mut pending = queue.subscribe_pending();

    let outcome = queue
        .save_with_offline_support(Destination::BreathingSessions, record("a"))
        .await;

    assert_eq!(outcome, SaveOutcome::written());
    assert_eq!(queue.pending_count(), 0);
    assert!(!pending.has_changed().unwrap());
    assert_eq!(storage.get(DEFAULT_STORAGE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn corrupt_queue_loads_empty_and_is_quarantined() {
    let storage = MemoryStore::new();
    storage
        .set(DEFAULT_STORAGE_KEY, "{not valid json")
        .await
        .unwrap();
    let remote = Arc::new(RecordingRemote::default());

    let queue = open_queue(&storage, &remote, true, QueueConfig::default()).await;
    assert_eq!(queue.pending_count(), 0);

    let keys = storage.keys().await;
    let quarantined: Vec<&String> = keys
        .iter()
        .filter(|key| key.starts_with("offline_sync_queue.corrupt-"))
        .collect();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(
        storage.get(quarantined[0]).await.unwrap().as_deref(),
        Some("{not valid json")
    );
}

#[tokio::test]
async fn malformed_entries_are_quarantined_and_valid_ones_load() {
    let storage = MemoryStore::new();
    let valid = QueuedEntry::new(Destination::MoodEntries, record("ok"));
    let raw = json!([
        valid,
        { "id": "not-a-uuid", "table": "mood_entries", "data": {}, "timestamp": 0 },
        { "id": valid.id, "table": "unknown_table", "data": {}, "timestamp": 0 },
    ])
    .to_string();
    storage.set(DEFAULT_STORAGE_KEY, &raw).await.unwrap();
    let remote = Arc::new(RecordingRemote::default());

    let queue = open_queue(&storage, &remote, false, QueueConfig::default()).await;
    assert_eq!(queue.pending_count(), 1);
    assert_eq!(
        persisted_labels(&storage, DEFAULT_STORAGE_KEY).await,
        vec!["ok"]
    );

    let quarantined = storage
        .keys()
        .await
        .into_iter()
        .find(|key| key.starts_with("offline_sync_queue.corrupt-"))
        .expect("rejected entries should be quarantined");
    let rejected: Vec<serde_json::Value> =
        serde_json::from_str(&storage.get(&quarantined).await.unwrap().unwrap()).unwrap();
    assert_eq!(rejected.len(), 2);
}

#[tokio::test]
async fn sync_is_skipped_while_offline() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    let queue = open_queue(&storage, &remote, false, QueueConfig::default()).await;
    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;

    let report = queue.sync_queue().await;
    assert_eq!(report.skipped, Some(SkipReason::Offline));
    assert_eq!(report.remaining, 1);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn empty_sync_sends_no_notice() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    let queue = open_queue(&storage, &remote, true, QueueConfig::default()).await;
    let mut notices = queue.subscribe_notices();

    let report = queue.sync_queue().await;
    assert_eq!(report, SyncReport::default());
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn entries_enqueued_during_a_pass_are_kept() {
    let storage = MemoryStore::new();
    let remote = Arc::new(GatedRemote::default());
    let queue = Arc::new(open_queue(&storage, &remote, false, QueueConfig::default()).await);

    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;
    queue.monitor().set_online(true);

    let pass = tokio::spawn({
        let queue = Arc::clone(&queue);
        async move { queue.sync_queue().await }
    });
    remote.entered.notified().await;

    queue.monitor().set_online(false);
    queue
        .save_with_offline_support(Destination::MoodEntries, record("b"))
        .await;
    remote.release.notify_one();

    let report = pass.await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(report.remaining, 1);
    assert_eq!(
        persisted_labels(&storage, DEFAULT_STORAGE_KEY).await,
        vec!["b"]
    );
}

#[tokio::test]
async fn exhausted_entries_move_to_dead_letters_and_can_be_requeued() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    remote.fail_label("bad");
    let config = QueueConfig {
        max_attempts: Some(2),
        ..QueueConfig::default()
    };
    let queue = open_queue(&storage, &remote, false, config).await;
    queue
        .save_with_offline_support(Destination::MoodEntries, record("bad"))
        .await;
    queue.monitor().set_online(true);
    let mut notices = queue.subscribe_notices();

    let first = queue.sync_queue().await;
    assert_eq!(first.dead_lettered, 0);
    assert_eq!(queue.pending_count(), 1);

    let second = queue.sync_queue().await;
    assert_eq!(second.failed, 1);
    assert_eq!(second.dead_lettered, 1);
    assert_eq!(second.remaining, 0);
    assert_eq!(queue.pending_count(), 0);

    let mut seen = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        seen.push(notice);
    }
    assert!(seen.contains(&QueueNotice::DeadLettered { count: 1 }));

    let dead = queue.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 2);

    assert_eq!(queue.requeue_dead_letters().await.unwrap(), 1);
    assert_eq!(queue.pending_count(), 1);
    assert_eq!(queue.pending_entries().await[0].attempts, 0);
    assert!(queue.dead_letters().await.unwrap().is_empty());
}

#[tokio::test]
async fn unlimited_attempts_never_dead_letter() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    remote.set_fail_all(true);
    let config = QueueConfig {
        max_attempts: None,
        ..QueueConfig::default()
    };
    let queue = open_queue(&storage, &remote, true, config).await;
    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;

    for _ in 0..12 {
        queue.sync_queue().await;
    }
    assert_eq!(queue.pending_count(), 1);
    assert_eq!(queue.pending_entries().await[0].attempts, 12);
    assert!(queue.dead_letters().await.unwrap().is_empty());
}

#[tokio::test]
async fn discard_dead_letters_clears_them() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    remote.set_fail_all(true);
    let config = QueueConfig {
        max_attempts: Some(1),
        ..QueueConfig::default()
    };
    let queue = open_queue(&storage, &remote, true, config).await;
    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;
    queue.sync_queue().await;

    assert_eq!(queue.discard_dead_letters().await.unwrap(), 1);
    assert!(queue.dead_letters().await.unwrap().is_empty());
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test]
async fn status_reflects_connectivity_and_pending() {
    let storage = MemoryStore::new();
    let remote = Arc::new(RecordingRemote::default());
    let queue = open_queue(&storage, &remote, false, QueueConfig::default()).await;
    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;

    let status = queue.status();
    assert!(!status.is_online);
    assert_eq!(status.pending, 1);
    assert_eq!(status.state, SyncState::Offline);

    queue.monitor().set_online(true);
    let status = queue.status();
    assert!(status.was_offline);
    assert_eq!(status.state, SyncState::Pending);
}

#[tokio::test]
async fn corrupt_dead_letter_list_is_quarantined_and_dead_lettering_continues() {
    let storage = MemoryStore::new();
    let dead_letter_key = QueueConfig::default().dead_letter_key();
    storage.set(&dead_letter_key, "{garbage").await.unwrap();
    let remote = Arc::new(RecordingRemote::default());
    remote.set_fail_all(true);
    let config = QueueConfig {
        max_attempts: Some(1),
        ..QueueConfig::default()
    };
    let queue = open_queue(&storage, &remote, true, config).await;
    queue
        .save_with_offline_support(Destination::MoodEntries, record("a"))
        .await;
    assert_eq!(queue.pending_count(), 1);

    let report = queue.sync_queue().await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(queue.pending_count(), 0);
    assert_eq!(remote.call_count(), 2);

    let dead = queue.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(label_of(&dead[0].data), "a");

    let quarantined: Vec<String> = storage
        .keys()
        .await
        .into_iter()
        .filter(|key| key.starts_with(&format!("{dead_letter_key}.corrupt-")))
        .collect();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(
        storage.get(&quarantined[0]).await.unwrap().as_deref(),
        Some("{garbage")
    );
}

#[tokio::test]
async fn corrupt_dead_letter_list_reads_as_empty() {
    let storage = MemoryStore::new();
    let dead_letter_key = QueueConfig::default().dead_letter_key();
    storage.set(&dead_letter_key, "not json at all").await.unwrap();
    let remote = Arc::new(RecordingRemote::default());
    let queue = open_queue(&storage, &remote, false, QueueConfig::default()).await;

    assert!(queue.dead_letters().await.unwrap().is_empty());
    assert_eq!(queue.requeue_dead_letters().await.unwrap(), 0);
    assert_eq!(queue.discard_dead_letters().await.unwrap(), 0);
    assert_eq!(storage.get(&dead_letter_key).await.unwrap(), None);
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::local::{LocalStorage, MemoryStorage};
use super::remote::RemoteSync;
use super::section::{now_ms, CachedSection, NavigationEntry, SectionStore, DEFAULT_MAX_AGE_MS};
use super::summary::render_summary;
use crate::utils::age_display;

/// Process-wide cache instance, see [`SectionCache::global`].
static GLOBAL: OnceLock<Arc<SectionCache>> = OnceLock::new();

/// Lazily-initialized cache of last-known-good Graph results.
///
/// The first access loads the local copy and, when a sync server is
/// configured, merges the remote copy. Concurrent first accesses share that
/// single initialization. Every mutation is written to local storage before
/// returning and then pushed to the sync server in the background. Pushes
/// run one at a time and a snapshot older than one already sent is dropped,
/// so the server ends up holding the latest state.
///
/// Storage and network failures are logged and ignored; the cache then
/// behaves as an in-memory cache for the rest of the process.
pub struct SectionCache {
    storage: Arc<dyn LocalStorage>,
    remote: Option<RemoteSync>,
    state: OnceCell<Mutex<SectionStore>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    /// Sequence number of the newest snapshot handed to a push task.
    sync_seq: AtomicU64,
    /// Sequence number of the last snapshot sent; held for the whole push.
    synced_seq: Arc<tokio::sync::Mutex<u64>>,
}

impl SectionCache {
    pub fn new(storage: Arc<dyn LocalStorage>, remote: Option<RemoteSync>) -> Self {
        Self {
            storage,
            remote,
            state: OnceCell::new(),
            pending: Mutex::new(Vec::new()),
            sync_seq: AtomicU64::new(0),
            synced_seq: Arc::new(tokio::sync::Mutex::new(0)),
        }
    }

    /// Memory-only cache.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), None)
    }

    /// Return the process-wide cache, building it with `init` on first call.
    pub fn global(init: impl FnOnce() -> SectionCache) -> Arc<SectionCache> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(init())))
    }

    async fn state(&self) -> &Mutex<SectionStore> {
        self.state
            .get_or_init(|| async move { Mutex::new(self.initial_state().await) })
            .await
    }

    async fn initial_state(&self) -> SectionStore {
        let mut store = match self.storage.load() {
            Ok(Some(store)) => {
                debug!(sections = store.sections.len(), "Loaded section store from local storage");
                store
            }
            Ok(None) => SectionStore::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load section store, starting empty");
                SectionStore::default()
            }
        };

        if let Some(ref remote) = self.remote {
            match remote.fetch().await {
                Ok(Some(remote_store)) => {
                    let taken = store.merge_remote(remote_store);
                    info!(taken = taken, "Merged sections from sync server");
                    if taken > 0 {
                        self.persist_local(&store);
                    }
                }
                Ok(None) => debug!("Sync server has no stored sections"),
                Err(e) => warn!(error = %e, "Failed to fetch sections from sync server"),
            }
        }

        store
    }

    fn lock(state: &Mutex<SectionStore>) -> MutexGuard<'_, SectionStore> {
        state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist_local(&self, store: &SectionStore) {
        if let Err(e) = self.storage.save(store) {
            warn!(error = %e, "Failed to persist section store locally");
        }
    }

    fn push_remote(&self, seq: u64, snapshot: SectionStore) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        let synced = Arc::clone(&self.synced_seq);
        let handle = tokio::spawn(async move {
            let mut last = synced.lock().await;
            if *last >= seq {
                debug!(seq = seq, "Newer snapshot already synced, skipping");
                return;
            }
            *last = seq;
            if let Err(e) = remote.push(&snapshot).await {
                warn!(error = %e, "Failed to sync sections to server");
            }
        });
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Apply a mutation, persist it locally, then schedule a remote push.
    async fn mutate<R>(&self, f: impl FnOnce(&mut SectionStore) -> R) -> R {
        let state = self.state().await;
        let (result, snapshot) = {
            let mut store = Self::lock(state);
            let result = f(&mut store);
            self.persist_local(&store);
            // Numbered under the store lock so sequence order is mutation order
            let snapshot = self
                .remote
                .as_ref()
                .map(|_| (self.sync_seq.fetch_add(1, Ordering::SeqCst) + 1, store.clone()));
            (result, snapshot)
        };
        if let Some((seq, snapshot)) = snapshot {
            self.push_remote(seq, snapshot);
        }
        result
    }

    async fn read<R>(&self, f: impl FnOnce(&SectionStore) -> R) -> R {
        let state = self.state().await;
        let store = Self::lock(state);
        f(&store)
    }

    // ===== Sections =====

    /// Insert or overwrite a section, stamped with the current time.
    pub async fn store(&self, key: &str, data: Value, metadata: Option<Map<String, Value>>) {
        let now = now_ms();
        self.mutate(|store| store.put(key, data, metadata, now)).await;
        debug!(section = key, "Section stored");
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.read(|store| store.get(key).cloned()).await
    }

    pub async fn get_section(&self, key: &str) -> Option<CachedSection> {
        self.read(|store| store.section(key).cloned()).await
    }

    pub async fn timestamp(&self, key: &str) -> Option<i64> {
        self.read(|store| store.section(key).map(|s| s.timestamp)).await
    }

    pub async fn metadata(&self, key: &str) -> Option<Map<String, Value>> {
        self.read(|store| store.section(key).and_then(|s| s.metadata.clone()))
            .await
    }

    pub async fn section_keys(&self) -> Vec<String> {
        self.read(|store| store.sections.keys().cloned().collect()).await
    }

    pub async fn last_updated(&self) -> Option<i64> {
        self.read(|store| store.last_updated).await
    }

    /// Advisory freshness check; callers decide whether to refetch.
    pub async fn is_fresh(&self, key: &str, max_age_ms: i64) -> bool {
        let now = now_ms();
        self.read(|store| store.is_fresh_at(key, max_age_ms, now)).await
    }

    pub async fn is_fresh_default(&self, key: &str) -> bool {
        self.is_fresh(key, DEFAULT_MAX_AGE_MS).await
    }

    /// "5m ago" style age for status output.
    pub async fn age_display(&self, key: &str) -> Option<String> {
        let now = now_ms();
        self.read(|store| {
            store
                .section(key)
                .map(|s| age_display((now - s.timestamp) / 60_000))
        })
        .await
    }

    pub async fn clear(&self, key: &str) -> bool {
        self.mutate(|store| store.remove(key).is_some()).await
    }

    pub async fn clear_all(&self) {
        self.mutate(|store| store.clear_sections()).await;
        info!("All cached sections cleared");
    }

    // ===== Navigation =====

    pub async fn record_navigation(&self, path: &str, title: &str) {
        let now = now_ms();
        self.mutate(|store| store.push_navigation(path, title, now)).await;
    }

    pub async fn navigation_history(&self) -> Vec<NavigationEntry> {
        self.read(|store| store.navigation_history.clone()).await
    }

    // ===== Summaries =====

    pub async fn ai_summary(&self) -> String {
        self.read(render_summary).await
    }

    /// Wait for background sync pushes so a short-lived process does not drop them.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                debug!(error = %e, "Sync task did not complete");
            }
        }
    }
}

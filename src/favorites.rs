//! Persisted watchlist.
//!
//! The collection is stored as a single JSON array under [`FAVORITES_KEY`] in a
//! [`KeyValueStore`]. In memory it is indexed by movie id and every change is
//! published on a watch channel so all screens observe the same state.
//!
//! Storage failures never reach the user: reads fall back to an empty
//! collection, failed writes are logged and the in-memory mutation stands.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, warn};

use crate::error::StorageError;
use crate::models::FavoriteEntry;

pub const FAVORITES_KEY: &str = "favorites";

/// Set of favorited movie ids as last published by the store.
pub type FavoriteIds = Arc<HashSet<i64>>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One file per key under a data directory, replaced atomically on write.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: StdMutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        store
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().ok().and_then(|v| v.get(key).cloned())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Insertion-ordered collection keyed by movie id.
#[derive(Debug, Default)]
struct Collection {
    by_id: HashMap<i64, (u64, FavoriteEntry)>,
    next_seq: u64,
}

impl Collection {
    fn from_entries(entries: Vec<FavoriteEntry>) -> Self {
        let mut collection = Self::default();
        for entry in entries {
            collection.insert(entry);
        }
        collection
    }

    fn insert(&mut self, entry: FavoriteEntry) -> bool {
        if self.by_id.contains_key(&entry.id) {
            return false;
        }
        self.by_id.insert(entry.id, (self.next_seq, entry));
        self.next_seq += 1;
        true
    }

    fn remove(&mut self, id: i64) -> bool {
        self.by_id.remove(&id).is_some()
    }

    fn entries(&self) -> Vec<FavoriteEntry> {
        let mut ordered: Vec<_> = self.by_id.values().collect();
        ordered.sort_by_key(|(seq, _)| *seq);
        ordered.into_iter().map(|(_, e)| e.clone()).collect()
    }

    fn ids(&self) -> FavoriteIds {
        Arc::new(self.by_id.keys().copied().collect())
    }
}

pub fn parse_favorites(raw: &str) -> Result<Vec<FavoriteEntry>, StorageError> {
    Ok(serde_json::from_str(raw)?)
}

pub struct FavoritesStore {
    kv: Arc<dyn KeyValueStore>,
    // Held across the persist step so writes land in mutation order.
    inner: Mutex<Collection>,
    tx: watch::Sender<FavoriteIds>,
}

impl FavoritesStore {
    /// Reads the persisted collection; missing or malformed data yields an empty one.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let collection = Collection::from_entries(read_entries(kv.as_ref()).await);
        let (tx, _rx) = watch::channel(collection.ids());
        debug!(count = collection.by_id.len(), "favorites loaded");
        Self {
            kv,
            inner: Mutex::new(collection),
            tx,
        }
    }

    /// Adds `entry` unless its id is already present. Returns whether it was added.
    pub async fn add(&self, entry: FavoriteEntry) -> bool {
        let mut inner = self.inner.lock().await;
        let id = entry.id;
        if !inner.insert(entry) {
            debug!(id, "favorite already present");
            return false;
        }
        self.tx.send_replace(inner.ids());
        self.persist(&inner).await;
        true
    }

    /// Removes the entry with `id`. Returns whether anything was removed.
    pub async fn remove(&self, id: i64) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.remove(id) {
            return false;
        }
        self.tx.send_replace(inner.ids());
        self.persist(&inner).await;
        true
    }

    pub fn contains(&self, id: i64) -> bool {
        self.tx.borrow().contains(&id)
    }

    pub async fn entries(&self) -> Vec<FavoriteEntry> {
        self.inner.lock().await.entries()
    }

    pub fn ids(&self) -> FavoriteIds {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FavoriteIds> {
        self.tx.subscribe()
    }

    async fn persist(&self, collection: &Collection) {
        let encoded = match serde_json::to_string(&collection.entries()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to encode favorites: {}", e);
                return;
            }
        };
        if let Err(e) = self.kv.set(FAVORITES_KEY, &encoded).await {
            error!("Failed to persist favorites: {}", e);
        }
    }
}

async fn read_entries(kv: &dyn KeyValueStore) -> Vec<FavoriteEntry> {
    let raw = match kv.get(FAVORITES_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            error!("Failed to read favorites: {}", e);
            return Vec::new();
        }
    };
    match parse_favorites(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Ignoring unreadable favorites: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64) -> FavoriteEntry {
        FavoriteEntry {
            id,
            title: format!("Movie {id}"),
            poster_path: Some(format!("/p{id}.jpg")),
            release_date: Some("2024-05-01".to_string()),
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disk gone".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk gone".to_string()))
        }
    }

    #[tokio::test]
    async fn add_then_contains_and_remove_then_absent() {
        let store = FavoritesStore::load(Arc::new(MemoryStore::new())).await;
        for id in [1, 42, 550] {
            assert!(store.add(entry(id)).await);
            assert!(store.contains(id));
            assert!(store.remove(id).await);
            assert!(!store.contains(id));
        }
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let store = FavoritesStore::load(Arc::new(MemoryStore::new())).await;
        store.add(entry(1)).await;
        let baseline = store.entries().await.len();
        assert!(store.add(entry(7)).await);
        assert!(!store.add(entry(7)).await);
        assert_eq!(store.entries().await.len(), baseline + 1);
    }

    #[tokio::test]
    async fn remove_missing_is_noop() {
        let kv = Arc::new(MemoryStore::new());
        let store = FavoritesStore::load(kv.clone()).await;
        assert!(!store.remove(99).await);
        assert!(kv.raw(FAVORITES_KEY).is_none());
    }

    #[tokio::test]
    async fn malformed_json_loads_empty() {
        let kv = Arc::new(MemoryStore::with_value(FAVORITES_KEY, "[{\"id\": 1,"));
        let store = FavoritesStore::load(kv).await;
        assert!(store.entries().await.is_empty());
        assert!(store.ids().is_empty());
    }

    #[tokio::test]
    async fn persists_json_array_in_insertion_order() {
        let kv = Arc::new(MemoryStore::new());
        let store = FavoritesStore::load(kv.clone()).await;
        store.add(entry(3)).await;
        store.add(entry(1)).await;
        store.add(entry(2)).await;
        store.remove(1).await;

        let raw = kv.raw(FAVORITES_KEY).unwrap();
        let saved = parse_favorites(&raw).unwrap();
        let ids: Vec<i64> = saved.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2]);

        let reopened = FavoritesStore::load(kv).await;
        assert_eq!(reopened.entries().await, saved);
    }

    #[tokio::test]
    async fn duplicate_ids_in_storage_collapse() {
        let raw = serde_json::to_string(&vec![entry(5), entry(5), entry(6)]).unwrap();
        let store = FavoritesStore::load(Arc::new(MemoryStore::with_value(FAVORITES_KEY, &raw))).await;
        assert_eq!(store.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn storage_failure_keeps_in_memory_state() {
        let store = FavoritesStore::load(Arc::new(BrokenStore)).await;
        assert!(store.add(entry(8)).await);
        assert!(store.contains(8));
    }

    #[tokio::test]
    async fn concurrent_adds_are_not_lost() {
        let kv = Arc::new(MemoryStore::new());
        let store = Arc::new(FavoritesStore::load(kv.clone()).await);
        let mut handles = Vec::new();
        for id in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.add(entry(id)).await }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let saved = parse_favorites(&kv.raw(FAVORITES_KEY).unwrap()).unwrap();
        assert_eq!(saved.len(), 20);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let store = FavoritesStore::load(Arc::new(MemoryStore::new())).await;
        let mut rx = store.subscribe();
        store.add(entry(11)).await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().contains(&11));
    }

    #[tokio::test]
    async fn file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(FileStore::new(dir.path().join("nested")));
        assert!(kv.get(FAVORITES_KEY).await.unwrap().is_none());

        let store = FavoritesStore::load(kv.clone()).await;
        store.add(entry(21)).await;

        let reopened = FavoritesStore::load(Arc::new(FileStore::new(dir.path().join("nested")))).await;
        assert!(reopened.contains(21));
        assert!(!dir.path().join("nested").join("favorites.json.tmp").exists());
    }
}

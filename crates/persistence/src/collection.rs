//! Typed JSON documents with serialized flushes

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{DocumentStore, PersistenceError};

/// A single typed document in a [`DocumentStore`]
///
/// Loading never fails: a missing or unreadable document yields `T::default()`.
/// Flushes are serialized, and [`Collection::save_with`] takes its snapshot
/// inside the flush lock, so the final write reflects the latest state.
pub struct Collection<T> {
    name: String,
    store: Arc<dyn DocumentStore>,
    flush_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(store: Arc<dyn DocumentStore>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store,
            flush_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the document, falling back to an empty value
    pub async fn load(&self) -> T {
        let bytes = match self.store.read(&self.name).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(document = %self.name, "No stored document, starting empty");
                return T::default();
            }
            Err(e) => {
                tracing::warn!(document = %self.name, error = %e, "Failed to read document, starting empty");
                return T::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(document = %self.name, error = %e, "Malformed document, starting empty");
                T::default()
            }
        }
    }

    /// Write a value
    pub async fn save(&self, value: &T) -> Result<(), PersistenceError> {
        let _guard = self.flush_lock.lock().await;
        self.write(value).await
    }

    /// Snapshot under the flush lock, then write
    pub async fn save_with<F>(&self, snapshot: F) -> Result<(), PersistenceError>
    where
        F: FnOnce() -> T + Send,
    {
        let _guard = self.flush_lock.lock().await;
        let value = snapshot();
        self.write(&value).await
    }

    async fn write(&self, value: &T) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.store.write(&self.name, bytes).await
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonFileStore, MemoryStore};
    use std::collections::BTreeMap;

    type Counts = BTreeMap<String, u32>;

    #[tokio::test]
    async fn test_missing_document_loads_default() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let collection: Collection<Counts> = Collection::new(store, "counts.json");
        assert!(collection.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_document_loads_default() {
        let store = Arc::new(MemoryStore::new());
        store
            .write("counts.json", b"{not json".to_vec())
            .await
            .unwrap();

        let collection: Collection<Counts> = Collection::new(store, "counts.json");
        assert!(collection.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(dir.path()));

        let mut counts = Counts::new();
        counts.insert("cena".to_string(), 3);

        let collection: Collection<Counts> = Collection::new(store.clone(), "counts.json");
        collection.save(&counts).await.unwrap();

        let reopened: Collection<Counts> = Collection::new(store, "counts.json");
        assert_eq!(reopened.load().await.get("cena"), Some(&3));
    }

    #[tokio::test]
    async fn test_concurrent_flushes_keep_latest_state() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let collection = Arc::new(Collection::<Counts>::new(store, "counts.json"));
        let state = Arc::new(parking_lot::RwLock::new(Counts::new()));

        let mut handles = Vec::new();
        for i in 0..16u32 {
            let collection = collection.clone();
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                state.write().insert(format!("k{}", i), i);
                let snapshot = state.clone();
                collection
                    .save_with(move || snapshot.read().clone())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(collection.load().await.len(), 16);
    }
}

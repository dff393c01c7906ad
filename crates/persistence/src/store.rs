//! Raw document stores

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::PersistenceError;

/// Named byte documents
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Read a document; `None` when it was never written
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Replace a document
    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), PersistenceError>;
}

fn check_name(name: &str) -> Result<(), PersistenceError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(PersistenceError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// One file per document under a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        check_name(name)?;
        match tokio::fs::read(self.path_for(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(name, e)),
        }
    }

    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        check_name(name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PersistenceError::io(name, e))?;

        // Rename over the old file so readers never see a partial document
        let target = self.path_for(name);
        let tmp = self.root.join(format!(".{}.tmp", name));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| PersistenceError::io(name, e))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| PersistenceError::io(name, e))?;

        tracing::trace!(document = %name, bytes = bytes.len(), "Document written");
        Ok(())
    }
}

/// Process-local store, used for tests and `backend: memory`
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents held
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        check_name(name)?;
        Ok(self.documents.read().get(name).cloned())
    }

    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        check_name(name)?;
        self.documents.write().insert(name.to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));

        assert!(store.read("a.json").await.unwrap().is_none());

        store.write("a.json", b"{\"x\":1}".to_vec()).await.unwrap();
        store.write("a.json", b"{\"x\":2}".to_vec()).await.unwrap();

        let bytes = store.read("a.json").await.unwrap().unwrap();
        assert_eq!(bytes, b"{\"x\":2}");
        assert!(!dir.path().join("nested").join(".a.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.write("../escape.json", vec![]).await,
            Err(PersistenceError::InvalidName(_))
        ));
        assert!(store.read("").await.is_err());
        assert!(store.is_empty());
    }
}

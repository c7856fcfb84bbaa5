use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{DirectoryId, FileId, error::CoordinationError};

/// Cluster-wide id -> path store for generated directories and files.
///
/// Ids are never reused, so an entry is written once and never updated or removed:
/// the map records what was ever created, not what currently exists on the
/// filesystem. A lookup returning `None` means the creating node has not
/// published the entry yet, callers are expected to poll.
#[async_trait]
pub trait NamespaceMap: Send + Sync {
    async fn create_dir(&self, id: DirectoryId, path: &str) -> Result<bool, CoordinationError>;
    async fn create_file(&self, id: FileId, path: &str) -> Result<bool, CoordinationError>;
    async fn get_dir(&self, id: DirectoryId) -> Result<Option<String>, CoordinationError>;
    async fn get_file(&self, id: FileId) -> Result<Option<String>, CoordinationError>;
    async fn dir_count(&self) -> Result<u64, CoordinationError>;
    async fn file_count(&self) -> Result<u64, CoordinationError>;
}

#[derive(Debug, Default)]
pub struct LocalNamespaceMap {
    directories: RwLock<HashMap<DirectoryId, String>>,
    files: RwLock<HashMap<FileId, String>>,
}

impl LocalNamespaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert_once(
        store: &RwLock<HashMap<u64, String>>,
        id: u64,
        path: &str,
    ) -> Result<bool, CoordinationError> {
        let mut store = store.write().await;
        if store.contains_key(&id) {
            return Ok(false);
        }
        store.insert(id, path.to_owned());
        Ok(true)
    }
}

#[async_trait]
impl NamespaceMap for LocalNamespaceMap {
    async fn create_dir(&self, id: DirectoryId, path: &str) -> Result<bool, CoordinationError> {
        Self::insert_once(&self.directories, id, path).await
    }
    async fn create_file(&self, id: FileId, path: &str) -> Result<bool, CoordinationError> {
        Self::insert_once(&self.files, id, path).await
    }
    async fn get_dir(&self, id: DirectoryId) -> Result<Option<String>, CoordinationError> {
        Ok(self.directories.read().await.get(&id).cloned())
    }
    async fn get_file(&self, id: FileId) -> Result<Option<String>, CoordinationError> {
        Ok(self.files.read().await.get(&id).cloned())
    }
    async fn dir_count(&self) -> Result<u64, CoordinationError> {
        Ok(self.directories.read().await.len() as u64)
    }
    async fn file_count(&self) -> Result<u64, CoordinationError> {
        Ok(self.files.read().await.len() as u64)
    }
}

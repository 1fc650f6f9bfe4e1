//! In-memory storage backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::StorageGateway;
use crate::error::StorageError;

/// Storage backend holding every container in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    containers: Mutex<HashMap<String, BTreeMap<String, Bytes>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places an item directly, replacing any existing one.
    pub async fn insert(&self, container: &str, name: &str, data: impl Into<Bytes>) {
        self.containers
            .lock()
            .await
            .entry(container.to_string())
            .or_default()
            .insert(name.to_string(), data.into());
    }

    /// Returns a copy of an item's content.
    pub async fn get(&self, container: &str, name: &str) -> Option<Bytes> {
        self.containers
            .lock()
            .await
            .get(container)
            .and_then(|items| items.get(name))
            .cloned()
    }

    /// Lists item names in a container, sorted.
    pub async fn names(&self, container: &str) -> Vec<String> {
        self.containers
            .lock()
            .await
            .get(container)
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageGateway for MemoryStorage {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        let mut containers = self.containers.lock().await;
        let items = containers.entry(container.to_string()).or_default();
        if items.contains_key(name) {
            return Err(StorageError::AlreadyExists {
                container: container.to_string(),
                name: name.to_string(),
            });
        }
        items.insert(name.to_string(), data);
        Ok(format!("memory://{container}/{name}"))
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StorageError> {
        Ok(self
            .containers
            .lock()
            .await
            .get(container)
            .is_some_and(|items| items.contains_key(name)))
    }

    async fn copy(
        &self,
        source_container: &str,
        name: &str,
        dest_container: &str,
        dest_name: &str,
    ) -> Result<(), StorageError> {
        let mut containers = self.containers.lock().await;
        let data = containers
            .get(source_container)
            .and_then(|items| items.get(name))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                container: source_container.to_string(),
                name: name.to_string(),
            })?;

        let dest = containers.entry(dest_container.to_string()).or_default();
        if dest.contains_key(dest_name) {
            return Err(StorageError::AlreadyExists {
                container: dest_container.to_string(),
                name: dest_name.to_string(),
            });
        }
        dest.insert(dest_name.to_string(), data);
        Ok(())
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), StorageError> {
        self.containers
            .lock()
            .await
            .get_mut(container)
            .and_then(|items| items.remove(name))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_refuses_overwrite() {
        let storage = MemoryStorage::new();
        let url = storage
            .upload("out", "a.eml", Bytes::from_static(b"one"))
            .await
            .unwrap();
        assert_eq!(url, "memory://out/a.eml");

        let err = storage
            .upload("out", "a.eml", Bytes::from_static(b"two"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert_eq!(storage.get("out", "a.eml").await.unwrap(), "one");
    }

    #[tokio::test]
    async fn test_move_item() {
        let storage = MemoryStorage::new();
        storage.insert("in", "a.msg", b"data".to_vec()).await;

        storage.move_item("in", "a.msg", "archive", "a_1.msg").await.unwrap();
        assert!(!storage.exists("in", "a.msg").await.unwrap());
        assert_eq!(storage.get("archive", "a_1.msg").await.unwrap(), "data");
        assert_eq!(storage.names("archive").await, vec!["a_1.msg"]);
    }

    #[tokio::test]
    async fn test_move_missing_item() {
        let storage = MemoryStorage::new();
        let err = storage.move_item("in", "x", "out", "y").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(storage.names("out").await.is_empty());
    }
}

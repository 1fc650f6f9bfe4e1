//! Storage areas the pipeline reads from and writes to.
//!
//! The pipeline only talks to [`StorageGateway`]. Two backends are provided:
//! [`FsStorage`] keeps one directory per container, [`MemoryStorage`] keeps
//! everything in a map and is meant for tests and embedding.

mod fs;
mod memory;
pub mod naming;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Storage primitives consumed by the pipeline.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Stores `data` as `name` in `container` and returns its URL.
    ///
    /// Fails with [`StorageError::AlreadyExists`] instead of overwriting.
    async fn upload(&self, container: &str, name: &str, data: Bytes)
    -> Result<String, StorageError>;

    /// Returns true if `name` exists in `container`.
    async fn exists(&self, container: &str, name: &str) -> Result<bool, StorageError>;

    /// Copies an item between containers. The destination must not exist.
    async fn copy(
        &self,
        source_container: &str,
        name: &str,
        dest_container: &str,
        dest_name: &str,
    ) -> Result<(), StorageError>;

    /// Deletes an item.
    async fn delete(&self, container: &str, name: &str) -> Result<(), StorageError>;

    /// Moves an item as copy-then-delete.
    ///
    /// The move is not atomic. If the delete fails after the copy, the item
    /// is left in both containers and [`StorageError::PartialMove`] is
    /// returned; nothing is rolled back.
    async fn move_item(
        &self,
        source_container: &str,
        name: &str,
        dest_container: &str,
        dest_name: &str,
    ) -> Result<(), StorageError> {
        self.copy(source_container, name, dest_container, dest_name)
            .await?;
        self.delete(source_container, name)
            .await
            .map_err(|source| StorageError::PartialMove {
                container: source_container.to_string(),
                name: name.to_string(),
                source: Box::new(source),
            })
    }
}

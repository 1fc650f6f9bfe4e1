//! Filesystem storage backend: one directory per container.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::StorageGateway;
use crate::error::StorageError;

/// Storage backend rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Creates a backend rooted at `root`. Directories are created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the regular files of a container, sorted by name.
    ///
    /// A missing container directory is reported as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn list(&self, container: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.container_dir(container)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list", container, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list", container, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| io_error("list", container, e))?
                .is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Opens an item for streaming and returns it with its length.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the item does not exist.
    pub async fn open(&self, container: &str, name: &str) -> Result<(File, u64), StorageError> {
        let path = self.item_path(container, name)?;
        let file = File::open(&path)
            .await
            .map_err(|e| map_io("open", container, name, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| map_io("open", container, name, e))?
            .len();
        Ok((file, len))
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, StorageError> {
        check_component(container)?;
        Ok(self.root.join(container))
    }

    fn item_path(&self, container: &str, name: &str) -> Result<PathBuf, StorageError> {
        check_component(name)?;
        Ok(self.container_dir(container)?.join(name))
    }

    async fn create_new(
        &self,
        container: &str,
        name: &str,
        data: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let dir = self.container_dir(container)?;
        let path = self.item_path(container, name)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error("create", container, e))?;

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| map_io("create", container, name, e))?;
        fill_or_remove(&path, file, data)
            .await
            .map_err(|e| io_error("write", name, e))?;
        Ok(path)
    }
}

/// Writes `data` to a freshly created file at `path`.
///
/// A failed write removes the file so no truncated item stays behind under
/// a name that `create_new` would then refuse.
async fn fill_or_remove<W>(path: &Path, mut file: W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(data).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path).await {
            tracing::warn!("Failed to remove partial file {:?}: {}", path, cleanup);
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl StorageGateway for FsStorage {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        let path = self.create_new(container, name, &data).await?;
        Ok(format!("file://{}", path.display()))
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StorageError> {
        let path = self.item_path(container, name)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| map_io("stat", container, name, e))
    }

    async fn copy(
        &self,
        source_container: &str,
        name: &str,
        dest_container: &str,
        dest_name: &str,
    ) -> Result<(), StorageError> {
        let source = self.item_path(source_container, name)?;
        let data = fs::read(&source)
            .await
            .map_err(|e| map_io("read", source_container, name, e))?;
        self.create_new(dest_container, dest_name, &data).await?;
        Ok(())
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), StorageError> {
        let path = self.item_path(container, name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| map_io("delete", container, name, e))
    }
}

/// Names map to single path components.
fn check_component(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn io_error(op: &'static str, name: &str, source: std::io::Error) -> StorageError {
    StorageError::Io {
        op,
        name: name.to_string(),
        source,
    }
}

fn map_io(op: &'static str, container: &str, name: &str, source: std::io::Error) -> StorageError {
    match source.kind() {
        ErrorKind::NotFound => StorageError::NotFound {
            container: container.to_string(),
            name: name.to_string(),
        },
        ErrorKind::AlreadyExists => StorageError::AlreadyExists {
            container: container.to_string(),
            name: name.to_string(),
        },
        _ => io_error(op, name, source),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "msgbridge-fs-{tag}-{}-{:08x}",
            std::process::id(),
            rand::random::<u32>()
        ))
    }

    #[tokio::test]
    async fn test_upload_list_open() {
        let root = temp_root("upload");
        let storage = FsStorage::new(&root);

        let url = storage
            .upload("out", "b.eml", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("b.eml"));
        storage
            .upload("out", "a.eml", Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert_eq!(storage.list("out").await.unwrap(), vec!["a.eml", "b.eml"]);
        assert!(storage.list("missing").await.unwrap().is_empty());

        let (mut file, len) = storage.open("out", "b.eml").await.unwrap();
        assert_eq!(len, 5);
        let mut content = String::new();
        file.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "hello");

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_never_overwrites() {
        let root = temp_root("overwrite");
        let storage = FsStorage::new(&root);
        storage
            .upload("out", "a.eml", Bytes::from_static(b"first"))
            .await
            .unwrap();
        let err = storage
            .upload("out", "a.eml", Bytes::from_static(b"second"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert_eq!(fs::read(root.join("out/a.eml")).await.unwrap(), b"first");

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_move_item() {
        let root = temp_root("move");
        let storage = FsStorage::new(&root);
        storage
            .upload("in", "a.msg", Bytes::from_static(b"data"))
            .await
            .unwrap();

        storage
            .move_item("in", "a.msg", "archive", "a_20240101_000000.msg")
            .await
            .unwrap();
        assert!(!storage.exists("in", "a.msg").await.unwrap());
        assert!(storage
            .exists("archive", "a_20240101_000000.msg")
            .await
            .unwrap());

        let err = storage.delete("in", "a.msg").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_file() {
        let root = temp_root("partial");
        fs::create_dir_all(&root).await.unwrap();
        let path = root.join("a.eml");
        fs::write(&path, b"hal").await.unwrap();

        let writer = tokio_test::io::Builder::new()
            .write(b"hal")
            .write_error(std::io::Error::new(ErrorKind::StorageFull, "disk full"))
            .build();
        let err = fill_or_remove(&path, writer, b"half written")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageFull);
        assert!(!fs::try_exists(&path).await.unwrap());

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let storage = FsStorage::new(temp_root("names"));
        for name in ["../escape", "a/b", "..", ""] {
            let err = storage.exists("in", name).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "{name}");
        }
    }
}

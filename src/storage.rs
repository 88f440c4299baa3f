//! Filesystem storage backends for uploaded bytes.
//!
//! Two roots are in play: a temporary root for sessions that are still
//! uploading and a permanent root for finalized ones. Both sit behind the
//! [`UploadStorage`] trait so the store never touches paths directly.

use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::entity::uploaded_file::StorageTier;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Write failed for {key}: {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy failed for {key} to {destination}: {source}")]
    CopyFailed {
        key: String,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A root that holds uploaded bytes under relative keys (`<token>/<name>`).
#[async_trait]
pub trait UploadStorage: Send + Sync + Debug {
    /// Write `data` under `key`, replacing anything already there.
    async fn save(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    async fn size(&self, key: &str) -> StorageResult<u64>;

    /// Remove the bytes under `key`. Already-missing bytes are not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Copy the bytes under `key` to an arbitrary path, creating parent
    /// directories. Returns the number of bytes copied.
    async fn copy_to(&self, key: &str, destination: &Path) -> StorageResult<u64>;

    /// Absolute location of `key` inside this root.
    fn path(&self, key: &str) -> StorageResult<PathBuf>;
}

/// Local filesystem storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    /// Create the root directory if needed and wrap it.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path, refusing anything that could leave the root.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains('\\') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl UploadStorage for FileSystemStorage {
    async fn save(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let write_failed = |source| StorageError::WriteFailed {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }

        let mut file = fs::File::create(&path).await.map_err(write_failed)?;
        file.write_all(data).await.map_err(write_failed)?;
        file.sync_all().await.map_err(write_failed)?;

        tracing::debug!(path = %path.display(), size_bytes = data.len(), "Stored upload bytes");
        Ok(())
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Io(e),
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn size(&self, key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let metadata = fs::metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Io(e),
        })?;
        Ok(metadata.len())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Upload bytes already gone");
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        // Drop the per-session directory once it is empty; a non-empty
        // directory simply stays.
        if let Some(parent) = path.parent() {
            if parent != self.root {
                let _ = fs::remove_dir(parent).await;
            }
        }

        Ok(())
    }

    async fn copy_to(&self, key: &str, destination: &Path) -> StorageResult<u64> {
        let source = self.key_to_path(key)?;
        let copy_failed = |source| StorageError::CopyFailed {
            key: key.to_string(),
            destination: destination.to_path_buf(),
            source,
        };

        if !fs::try_exists(&source).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(copy_failed)?;
        }

        fs::copy(&source, destination).await.map_err(copy_failed)
    }

    fn path(&self, key: &str) -> StorageResult<PathBuf> {
        self.key_to_path(key)
    }
}

/// The pair of roots an upload store works with.
#[derive(Debug, Clone)]
pub struct StorageBackends {
    pub temporary: Arc<dyn UploadStorage>,
    pub permanent: Arc<dyn UploadStorage>,
}

impl StorageBackends {
    pub fn new(temporary: Arc<dyn UploadStorage>, permanent: Arc<dyn UploadStorage>) -> Self {
        Self {
            temporary,
            permanent,
        }
    }

    /// Filesystem backends rooted at the two configured folders.
    pub async fn from_settings(settings: &crate::config::UploadSettings) -> StorageResult<Self> {
        let temporary = FileSystemStorage::new(&settings.temp_storage_root).await?;
        let permanent = FileSystemStorage::new(&settings.upload_storage_root).await?;
        Ok(Self::new(Arc::new(temporary), Arc::new(permanent)))
    }

    pub fn for_tier(&self, tier: StorageTier) -> &dyn UploadStorage {
        match tier {
            StorageTier::Temporary => self.temporary.as_ref(),
            StorageTier::Permanent => self.permanent.as_ref(),
        }
    }
}

/// Storage key for a file in a session: `<token>/<name>`.
pub fn storage_key(token: &str, name: &str) -> String {
    format!("{}/{}", token, name)
}

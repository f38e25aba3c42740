//! Local filesystem storage.
//!
//! Mostly used as the cache/staging store next to a remote backend: files
//! uploaded here expose their path, so a later upload to Azure reads them
//! straight from disk.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::source::UploadSource;
use crate::storage::{BlobReader, Storage, UploadMetadata, UrlOptions};

/// Storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
    prefix: Option<String>,
}

impl FileSystemStorage {
    /// Create storage rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: None,
        }
    }

    /// Serve URLs as `<prefix>/<id>` instead of absolute file paths.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a file with `id` is stored at.
    pub fn path(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let valid = !id.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for FileSystemStorage {
    async fn upload(
        &self,
        source: UploadSource,
        id: &str,
        _metadata: &UploadMetadata,
    ) -> Result<()> {
        let dest = self.path(id)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let written = match source {
            UploadSource::LocalFile { path }
            | UploadSource::FrameworkRef {
                resolved_path: path,
            } => fs::copy(&path, &dest).await?,
            UploadSource::Stream(mut reader) => {
                let mut file = fs::File::create(&dest).await?;
                tokio::io::copy(&mut reader, &mut file).await?
            }
        };

        debug!(id = %id, path = %dest.display(), size = written, "stored file");
        Ok(())
    }

    async fn open(&self, id: &str) -> Result<BlobReader> {
        let path = self.path(id)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound { id: id.to_string() })
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();
        Ok(BlobReader::new(file).with_size(size))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(id = %id, "deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, id: &str, _options: &UrlOptions) -> Result<String> {
        let path = self.path(id)?;
        match &self.prefix {
            Some(prefix) => Ok(format!("{}/{}", prefix, id)),
            None => Ok(path.display().to_string()),
        }
    }

    fn local_path(&self, id: &str) -> Option<PathBuf> {
        self.path(id).ok()
    }
}

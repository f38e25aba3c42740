//! Upload sources.
//!
//! A source is classified once, when it is built, so backends can pick the
//! cheapest way to read it without probing it again.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::storage::{BlobReader, Storage, UrlOptions};

/// Bytes handed to [`Storage::upload`].
pub enum UploadSource {
    /// A file on local disk.
    LocalFile { path: PathBuf },
    /// An [`UploadedFile`] whose backing storage keeps it on local disk.
    FrameworkRef { resolved_path: PathBuf },
    /// Anything else that can be read.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl UploadSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::LocalFile { path: path.into() }
    }

    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Stream(Box::new(reader))
    }

    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::reader(Cursor::new(data.into()))
    }

    /// Resolve a stored file into a source.
    ///
    /// Files kept on local disk are read straight from their path; files in
    /// any other backend are streamed from it.
    pub async fn from_uploaded_file(file: &UploadedFile) -> Result<Self> {
        match file.storage.local_path(&file.id) {
            Some(resolved_path) => Ok(Self::FrameworkRef { resolved_path }),
            None => Ok(Self::Stream(Box::new(file.open().await?))),
        }
    }

    /// Filesystem path the source can be read from directly, if any.
    pub fn extract_path(&self) -> Option<&Path> {
        match self {
            Self::LocalFile { path } => Some(path),
            Self::FrameworkRef { resolved_path } => Some(resolved_path),
            Self::Stream(_) => None,
        }
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalFile { path } => f.debug_struct("LocalFile").field("path", path).finish(),
            Self::FrameworkRef { resolved_path } => f
                .debug_struct("FrameworkRef")
                .field("resolved_path", resolved_path)
                .finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for UploadSource {
    fn from(data: Bytes) -> Self {
        Self::bytes(data)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(data: Vec<u8>) -> Self {
        Self::bytes(data)
    }
}

/// A file the attachment framework has already stored somewhere.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub id: String,
    pub storage: Arc<dyn Storage>,
}

impl UploadedFile {
    pub fn new(id: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            id: id.into(),
            storage,
        }
    }

    pub async fn open(&self) -> Result<BlobReader> {
        self.storage.open(&self.id).await
    }

    pub fn url(&self, options: &UrlOptions) -> Result<String> {
        self.storage.url(&self.id, options)
    }

    pub async fn delete(&self) -> Result<()> {
        self.storage.delete(&self.id).await
    }
}

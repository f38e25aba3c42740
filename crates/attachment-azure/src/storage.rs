//! The pluggable storage contract shared by all backends.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::error::Result;
use crate::sas::SasOptions;
use crate::source::UploadSource;

/// Hints attached to an upload by the calling framework.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMetadata {
    pub mime_type: Option<String>,
    pub filename: Option<String>,
}

impl UploadMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// Per-call overrides for [`Storage::url`].
#[derive(Debug, Clone, Default)]
pub struct UrlOptions {
    /// Return an unsigned URL. Falls back to the backend's configured default.
    pub public: Option<bool>,
    /// URL scheme. Falls back to the backend's configured default.
    pub scheme: Option<String>,
    /// Extra signing options (expiry, IP range, response headers).
    pub sas: SasOptions,
}

impl UrlOptions {
    pub fn public() -> Self {
        Self {
            public: Some(true),
            ..Default::default()
        }
    }

    pub fn signed() -> Self {
        Self {
            public: Some(false),
            ..Default::default()
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_sas(mut self, sas: SasOptions) -> Self {
        self.sas = sas;
        self
    }
}

/// A backend attachments can be uploaded to, read from and linked to.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Store `source` under `id`, overwriting any existing file.
    async fn upload(&self, source: UploadSource, id: &str, metadata: &UploadMetadata)
        -> Result<()>;

    /// Open the file stored under `id` for reading.
    async fn open(&self, id: &str) -> Result<BlobReader>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// URL the file can be fetched from.
    fn url(&self, id: &str, options: &UrlOptions) -> Result<String>;

    /// Filesystem path of `id`, for backends that keep files on local disk.
    fn local_path(&self, _id: &str) -> Option<PathBuf> {
        None
    }
}

/// Streaming handle over a stored file plus the properties it was stored with.
pub struct BlobReader {
    inner: Box<dyn AsyncRead + Send + Unpin>,
    content_type: Option<String>,
    content_disposition: Option<String>,
    size: Option<u64>,
}

impl BlobReader {
    pub fn new(inner: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            content_type: None,
            content_disposition: None,
            size: None,
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_content_disposition(mut self, content_disposition: Option<String>) -> Self {
        self.content_disposition = content_disposition;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Read the remaining contents into memory.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(self.size.unwrap_or(0) as usize);
        self.inner.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobReader")
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for BlobReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

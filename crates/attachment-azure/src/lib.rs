//! Azure Blob Storage backend for file attachments.
//!
//! This crate implements a small storage contract ([`Storage`]: upload, open,
//! delete, url) on top of an Azure Blob container, plus a local filesystem
//! backend that can be used as a cache in front of it.
//!
//! # Features
//!
//! - Uploads straight from local files, or from any `AsyncRead`
//! - Content type and inline content disposition from upload metadata
//! - Streaming reads with the stored blob properties
//! - Read-only SAS URLs signed locally with the account key
//!
//! # Example
//!
//! ```rust,no_run
//! use attachment_azure::{
//!     AzureBlobConfig, AzureBlobStorage, Storage, UploadMetadata, UploadSource, UrlOptions,
//! };
//!
//! # async fn example() -> Result<(), attachment_azure::StorageError> {
//! let config = AzureBlobConfig::new("myaccount", "bXlzZWNyZXRrZXk=", "attachments");
//! let storage = AzureBlobStorage::new(config)?;
//!
//! let metadata = UploadMetadata::new()
//!     .with_mime_type("image/png")
//!     .with_filename("avatar.png");
//! storage
//!     .upload(UploadSource::file("/tmp/avatar.png"), "users/1/avatar.png", &metadata)
//!     .await?;
//!
//! // Signed, read-only link valid for thirty minutes
//! let url = storage.url("users/1/avatar.png", &UrlOptions::default())?;
//! println!("{url}");
//!
//! let data = storage.open("users/1/avatar.png").await?.bytes().await?;
//! println!("read {} bytes", data.len());
//! # Ok(())
//! # }
//! ```

mod azure_blob;
mod config;
pub mod content_disposition;
mod error;
mod file_system;
pub mod sas;
mod source;
mod storage;

pub use azure_blob::{AzureBlobStorage, BlobHeaders, LOCAL_UPLOAD_TIMEOUT};
pub use config::{AzureBlobConfig, MultipartThreshold, DEFAULT_SCHEME};
pub use error::{Result, StorageError};
pub use file_system::FileSystemStorage;
pub use sas::{SasOptions, SharedAccessSignature};
pub use source::{UploadSource, UploadedFile};
pub use storage::{BlobReader, Storage, UploadMetadata, UrlOptions};

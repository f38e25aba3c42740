//! Error types for attachment storage.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// Errors that can occur when storing or reading attachments.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The identifier does not exist in the container.
    #[error("file {id:?} not found on storage")]
    NotFound { id: String },

    /// Any other failure talking to the blob service, passed through as-is.
    #[error("blob service error: {0}")]
    Transport(#[from] object_store::Error),

    /// Account name or access key could not be used to sign requests.
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// Uploading a local file did not finish within the allowed time.
    #[error("upload of {id:?} timed out after {after:?}")]
    Timeout { id: String, after: Duration },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme: {0}")]
    InvalidScheme(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// HTTP status code of the underlying service response, when the
    /// transport error encodes one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Transport(err) => match err {
                object_store::Error::NotFound { .. } => Some(404),
                object_store::Error::AlreadyExists { .. } => Some(409),
                object_store::Error::Precondition { .. } => Some(412),
                object_store::Error::NotModified { .. } => Some(304),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

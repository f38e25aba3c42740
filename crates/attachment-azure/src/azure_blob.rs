//! Azure Blob Storage backend.
//!
//! Blob transfers go through `object_store`'s Azure client with shared-key
//! authentication. Read URLs are signed locally with a service SAS.

use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload, RetryConfig,
};
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info};
use url::Url;

use crate::config::AzureBlobConfig;
use crate::content_disposition;
use crate::error::{Result, StorageError};
use crate::sas::{SasOptions, SharedAccessSignature};
use crate::source::UploadSource;
use crate::storage::{BlobReader, Storage, UploadMetadata, UrlOptions};

/// Upper bound on uploading a file read from local disk.
pub const LOCAL_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport headers set on a blob when it is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobHeaders {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

impl BlobHeaders {
    /// Headers derived from upload metadata: the mime type becomes the
    /// content type, the filename an inline content disposition.
    pub fn from_metadata(metadata: &UploadMetadata) -> Self {
        Self {
            content_type: metadata.mime_type.clone(),
            content_disposition: metadata
                .filename
                .as_deref()
                .map(content_disposition::inline),
        }
    }

    fn into_attributes(self) -> Attributes {
        let mut attributes = Attributes::new();
        if let Some(content_type) = self.content_type {
            attributes.insert(Attribute::ContentType, content_type.into());
        }
        if let Some(content_disposition) = self.content_disposition {
            attributes.insert(Attribute::ContentDisposition, content_disposition.into());
        }
        attributes
    }
}

/// Attachment storage in a single Azure Blob container.
#[derive(Debug, Clone)]
pub struct AzureBlobStorage {
    config: AzureBlobConfig,
    sas: SharedAccessSignature,
    client: Arc<dyn ObjectStore>,
}

impl AzureBlobStorage {
    /// Create the adapter and its Azure client from `config`.
    ///
    /// No request is made; invalid credentials fail here only when they are
    /// malformed.
    pub fn new(config: AzureBlobConfig) -> Result<Self> {
        let sas = SharedAccessSignature::new(&config.account_name, &config.access_key)?;

        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(&config.account_name)
            .with_access_key(&config.access_key)
            .with_container_name(&config.container_name)
            .with_use_emulator(config.use_emulator)
            .with_retry(RetryConfig {
                max_retries: 0,
                ..Default::default()
            });
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint.to_string())
                .with_allow_http(endpoint.scheme() == "http");
        }
        let client = builder.build()?;

        info!(
            account = %config.account_name,
            container = %config.container_name,
            emulator = config.use_emulator,
            "azure blob storage configured"
        );

        Ok(Self {
            config,
            sas,
            client: Arc::new(client),
        })
    }

    /// Create the adapter over an existing object store client.
    ///
    /// The signer is still derived from the configured credentials, so URLs
    /// look exactly like those of [`AzureBlobStorage::new`].
    pub fn with_store(config: AzureBlobConfig, client: Arc<dyn ObjectStore>) -> Result<Self> {
        let sas = SharedAccessSignature::new(&config.account_name, &config.access_key)?;
        Ok(Self {
            config,
            sas,
            client,
        })
    }

    pub fn config(&self) -> &AzureBlobConfig {
        &self.config
    }

    pub fn container_name(&self) -> &str {
        &self.config.container_name
    }

    pub fn signer(&self) -> &SharedAccessSignature {
        &self.sas
    }

    /// Write `source` to the blob `id`, overwriting it.
    ///
    /// Sources with a local path are read from disk and sent under
    /// [`LOCAL_UPLOAD_TIMEOUT`]; streams are read into memory and sent as is.
    pub async fn put(&self, source: UploadSource, id: &str, headers: BlobHeaders) -> Result<()> {
        let location = object_path(id)?;
        let options = PutOptions {
            attributes: headers.into_attributes(),
            ..Default::default()
        };

        match source {
            UploadSource::LocalFile { path }
            | UploadSource::FrameworkRef {
                resolved_path: path,
            } => {
                let upload = async {
                    let data = read_local_file(&path).await?;
                    debug!(
                        id = %id,
                        path = %path.display(),
                        size = data.len(),
                        "uploading blob from local file"
                    );
                    self.client
                        .put_opts(&location, PutPayload::from(data), options)
                        .await?;
                    Ok::<(), StorageError>(())
                };
                with_upload_timeout(id, LOCAL_UPLOAD_TIMEOUT, upload).await?;
            }
            UploadSource::Stream(mut reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data).await?;
                debug!(id = %id, size = data.len(), "uploading blob from stream");
                self.client
                    .put_opts(&location, PutPayload::from(data), options)
                    .await?;
            }
        }

        info!(id = %id, container = %self.config.container_name, "blob stored");
        Ok(())
    }

    /// URL of `container/id` on the blob endpoint, without query.
    pub fn generate_uri(&self, id: &str) -> Result<Url> {
        self.location_uri(&object_path(id)?)
    }

    fn location_uri(&self, location: &ObjectPath) -> Result<Url> {
        let mut uri = self.config.blob_endpoint()?;
        if uri.cannot_be_a_base() {
            return Err(StorageError::Config(format!(
                "endpoint {uri} cannot be a base url"
            )));
        }
        uri.path_segments_mut()
            .map_err(|_| StorageError::Config("endpoint cannot be a base url".to_string()))?
            .pop_if_empty()
            .push(&self.config.container_name)
            .extend(location.parts().map(|part| part.as_ref().to_string()));
        Ok(uri)
    }
}

#[async_trait]
impl Storage for AzureBlobStorage {
    async fn upload(
        &self,
        source: UploadSource,
        id: &str,
        metadata: &UploadMetadata,
    ) -> Result<()> {
        self.put(source, id, BlobHeaders::from_metadata(metadata))
            .await
    }

    async fn open(&self, id: &str) -> Result<BlobReader> {
        let location = object_path(id)?;
        debug!(id = %id, "fetching blob");

        let result = match self.client.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound { id: id.to_string() })
            }
            Err(e) => return Err(e.into()),
        };

        let size = result.meta.size as u64;
        let content_type = attribute(&result.attributes, &Attribute::ContentType);
        let content_disposition = attribute(&result.attributes, &Attribute::ContentDisposition);
        let stream = result
            .into_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        Ok(BlobReader::new(StreamReader::new(stream))
            .with_size(size)
            .with_content_type(content_type)
            .with_content_disposition(content_disposition))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let location = object_path(id)?;
        self.client.delete(&location).await?;
        info!(id = %id, container = %self.config.container_name, "blob deleted");
        Ok(())
    }

    /// Unsigned when `public`, otherwise carries a read-only SAS token.
    fn url(&self, id: &str, options: &UrlOptions) -> Result<String> {
        let public = options.public.unwrap_or(self.config.public);
        let scheme = options
            .scheme
            .as_deref()
            .unwrap_or_else(|| self.config.scheme());

        let location = object_path(id)?;
        let mut uri = self.location_uri(&location)?;
        uri.set_scheme(scheme)
            .map_err(|_| StorageError::InvalidScheme(scheme.to_string()))?;

        if !public {
            let sas_options = SasOptions {
                permissions: Some("r".to_string()),
                resource: Some("b".to_string()),
                protocol: Some(sas_protocol(scheme).to_string()),
                ..options.sas.clone()
            };
            let path = format!("/{}/{}", self.config.container_name, location);
            let token = self.sas.generate_service_sas_token(&path, &sas_options);
            uri.set_query(Some(&token));
        }

        Ok(uri.to_string())
    }
}

/// Parse `id` into a blob location.
///
/// `Path::parse` drops a leading or trailing '/' and accepts "", which would
/// store a blob under a different name than the one its URL points at.
fn object_path(id: &str) -> Result<ObjectPath> {
    let location =
        ObjectPath::parse(id).map_err(|e| StorageError::InvalidId(format!("{id}: {e}")))?;
    if id.is_empty() || location.as_ref() != id {
        return Err(StorageError::InvalidId(id.to_string()));
    }
    Ok(location)
}

fn attribute(attributes: &Attributes, key: &Attribute) -> Option<String> {
    attributes
        .get(key)
        .map(|value| AsRef::<str>::as_ref(value).to_string())
}

/// `spr` only accepts "https" or "https,http".
fn sas_protocol(scheme: &str) -> &'static str {
    if scheme.eq_ignore_ascii_case("https") {
        "https"
    } else {
        "https,http"
    }
}

/// Read a whole file; the handle is closed before this returns.
async fn read_local_file(path: &Path) -> Result<Bytes> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).await?;
    Ok(Bytes::from(data))
}

async fn with_upload_timeout<F>(id: &str, after: Duration, upload: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(after, upload).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout {
            id: id.to_string(),
            after,
        }),
    }
}

//! Configuration for the Azure Blob storage adapter.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StorageError};

/// Scheme used for generated URLs when none is configured.
pub const DEFAULT_SCHEME: &str = "https";

/// Port and host of the local storage emulator (Azurite).
pub const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000";

/// Size thresholds above which chunked transfers would be used.
///
/// Accepted for configuration compatibility; the adapter leaves chunking
/// to the blob client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipartThreshold {
    pub upload: u64,
    pub copy: u64,
}

impl Default for MultipartThreshold {
    fn default() -> Self {
        Self {
            upload: 15 * 1024 * 1024,
            copy: 100 * 1024 * 1024,
        }
    }
}

/// Settings for [`AzureBlobStorage`](crate::AzureBlobStorage).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureBlobConfig {
    /// Storage account name
    pub account_name: String,

    /// Base64 encoded account access key
    pub access_key: String,

    /// Container all blobs are stored in
    pub container_name: String,

    #[serde(default)]
    pub multipart_threshold: MultipartThreshold,

    /// Whether URLs are unsigned by default
    #[serde(default)]
    pub public: bool,

    /// Default URL scheme, "https" when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    /// Blob service endpoint override (custom domain, emulator, sovereign cloud)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Url>,

    /// Target the local storage emulator instead of Azure
    #[serde(default)]
    pub use_emulator: bool,
}

impl AzureBlobConfig {
    pub fn new(
        account_name: impl Into<String>,
        access_key: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            access_key: access_key.into(),
            container_name: container_name.into(),
            multipart_threshold: MultipartThreshold::default(),
            public: false,
            scheme: None,
            endpoint: None,
            use_emulator: false,
        }
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_emulator(mut self, use_emulator: bool) -> Self {
        self.use_emulator = use_emulator;
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Load a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Build a config from `AZURE_STORAGE_*` environment variables.
    ///
    /// `AZURE_STORAGE_ACCOUNT`, `AZURE_STORAGE_ACCESS_KEY` and
    /// `AZURE_STORAGE_CONTAINER` are required. `AZURE_STORAGE_ENDPOINT`,
    /// `AZURE_STORAGE_PUBLIC`, `AZURE_STORAGE_SCHEME` and
    /// `AZURE_STORAGE_USE_EMULATOR` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StorageError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(
            required("AZURE_STORAGE_ACCOUNT")?,
            required("AZURE_STORAGE_ACCESS_KEY")?,
            required("AZURE_STORAGE_CONTAINER")?,
        );

        if let Some(endpoint) = lookup("AZURE_STORAGE_ENDPOINT") {
            config.endpoint = Some(Url::parse(&endpoint)?);
        }
        if let Some(public) = lookup("AZURE_STORAGE_PUBLIC") {
            config.public = parse_bool("AZURE_STORAGE_PUBLIC", &public)?;
        }
        if let Some(emulator) = lookup("AZURE_STORAGE_USE_EMULATOR") {
            config.use_emulator = parse_bool("AZURE_STORAGE_USE_EMULATOR", &emulator)?;
        }
        config.scheme = lookup("AZURE_STORAGE_SCHEME").filter(|s| !s.is_empty());

        Ok(config)
    }

    /// Scheme for generated URLs.
    pub fn scheme(&self) -> &str {
        self.scheme.as_deref().unwrap_or(DEFAULT_SCHEME)
    }

    /// Base URL of the blob service, without the container.
    pub fn blob_endpoint(&self) -> Result<Url> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        if self.use_emulator {
            return Ok(Url::parse(&format!(
                "{}/{}",
                EMULATOR_BLOB_ENDPOINT, self.account_name
            ))?);
        }
        Ok(Url::parse(&format!(
            "https://{}.blob.core.windows.net",
            self.account_name
        ))?)
    }
}

impl fmt::Debug for AzureBlobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobConfig")
            .field("account_name", &self.account_name)
            .field("access_key", &"<redacted>")
            .field("container_name", &self.container_name)
            .field("multipart_threshold", &self.multipart_threshold)
            .field("public", &self.public)
            .field("scheme", &self.scheme)
            .field("endpoint", &self.endpoint)
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(StorageError::Config(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AzureBlobConfig::new("acct", "a2V5", "uploads");
        assert_eq!(config.scheme(), "https");
        assert!(!config.public);
        assert!(!config.use_emulator);
        assert_eq!(config.multipart_threshold.upload, 15 * 1024 * 1024);
        assert_eq!(
            config.blob_endpoint().unwrap().as_str(),
            "https://acct.blob.core.windows.net/"
        );
    }

    #[test]
    fn test_from_toml() {
        let config = AzureBlobConfig::from_toml_str(
            r#"
            account_name = "acct"
            access_key = "a2V5"
            container_name = "uploads"
            public = true
            scheme = "http"

            [multipart_threshold]
            upload = 1024
            "#,
        )
        .unwrap();

        assert_eq!(config.account_name, "acct");
        assert_eq!(config.container_name, "uploads");
        assert!(config.public);
        assert_eq!(config.scheme(), "http");
        assert_eq!(config.multipart_threshold.upload, 1024);
        assert_eq!(config.multipart_threshold.copy, 100 * 1024 * 1024);
    }

    #[test]
    fn test_from_toml_missing_field() {
        let err = AzureBlobConfig::from_toml_str("account_name = \"acct\"").unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("AZURE_STORAGE_ACCOUNT", "acct"),
            ("AZURE_STORAGE_ACCESS_KEY", "a2V5"),
            ("AZURE_STORAGE_CONTAINER", "uploads"),
            ("AZURE_STORAGE_PUBLIC", "yes"),
            ("AZURE_STORAGE_ENDPOINT", "https://cdn.example.com"),
        ]
        .into_iter()
        .collect();

        let config =
            AzureBlobConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert!(config.public);
        assert_eq!(config.scheme(), "https");
        assert_eq!(
            config.blob_endpoint().unwrap().as_str(),
            "https://cdn.example.com/"
        );
    }

    #[test]
    fn test_from_lookup_requires_container() {
        let err = AzureBlobConfig::from_lookup(|k| match k {
            "AZURE_STORAGE_ACCOUNT" => Some("acct".to_string()),
            "AZURE_STORAGE_ACCESS_KEY" => Some("a2V5".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("AZURE_STORAGE_CONTAINER"));
    }

    #[test]
    fn test_emulator_endpoint() {
        let config = AzureBlobConfig::new("devstoreaccount1", "a2V5", "uploads").with_emulator(true);
        assert_eq!(
            config.blob_endpoint().unwrap().as_str(),
            "http://127.0.0.1:10000/devstoreaccount1"
        );
    }

    #[test]
    fn test_debug_redacts_access_key() {
        let config = AzureBlobConfig::new("acct", "c2VjcmV0", "uploads");
        let debug = format!("{config:?}");
        assert!(debug.contains("acct"));
        assert!(!debug.contains("c2VjcmV0"));
    }

    #[test]
    fn test_parse_bool_rejects_garbage() {
        assert!(parse_bool("X", "maybe").is_err());
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
    }
}

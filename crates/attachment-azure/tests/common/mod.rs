//! Shared setup for integration tests.

use std::sync::Arc;

use attachment_azure::{AzureBlobConfig, AzureBlobStorage, FileSystemStorage};
use object_store::memory::InMemory;
use tempfile::TempDir;

/// "integration-test-key" base64 encoded
pub const ACCESS_KEY: &str = "aW50ZWdyYXRpb24tdGVzdC1rZXk=";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn azure_config() -> AzureBlobConfig {
    AzureBlobConfig::new("itest", ACCESS_KEY, "attachments")
}

/// Azure adapter over an in-memory container.
pub fn azure_storage() -> Arc<AzureBlobStorage> {
    init_tracing();
    Arc::new(AzureBlobStorage::with_store(azure_config(), Arc::new(InMemory::new())).unwrap())
}

/// Filesystem cache in a fresh temp dir. Keep the dir alive for the test.
pub fn cache_storage() -> (Arc<FileSystemStorage>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileSystemStorage::new(temp_dir.path().join("cache")));
    (storage, temp_dir)
}

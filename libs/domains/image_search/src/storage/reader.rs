use async_trait::async_trait;

use crate::error::ImageSearchResult;

/// Read-only access to a blob store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectReader: Send + Sync {
    /// Full object contents; `NotFound` if the object does not exist
    async fn read_bytes(&self, bucket: &str, object: &str) -> ImageSearchResult<Vec<u8>>;

    /// Object names in listing order, directory placeholders excluded
    async fn list_objects(&self, bucket: &str) -> ImageSearchResult<Vec<String>>;
}

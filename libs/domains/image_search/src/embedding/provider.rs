use async_trait::async_trait;

use crate::error::ImageSearchResult;
use crate::models::Embedding;

/// Computes a fixed-length embedding for raw image bytes.
///
/// Failures surface as `EmbeddingService` errors and are not retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    /// Model identifier, for logs
    fn model_name(&self) -> &'static str;

    async fn embed(&self, image: &[u8]) -> ImageSearchResult<Embedding>;
}

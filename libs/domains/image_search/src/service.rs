use std::sync::Arc;
use tracing::instrument;

use crate::embedding::ImageEmbedder;
use crate::error::{ImageSearchError, ImageSearchResult};
use crate::models::{Embedding, SearchFilter};
use crate::queries::FilterMode;
use crate::repository::ImageStore;
use crate::storage::ObjectReader;

/// Ingestion and retrieval workflows over an [`ImageStore`]
pub struct ImageSearchService<S: ImageStore> {
    store: Arc<S>,
    embedder: Arc<dyn ImageEmbedder>,
    objects: Option<Arc<dyn ObjectReader>>,
}

impl<S: ImageStore> Clone for ImageSearchService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
            objects: self.objects.clone(),
        }
    }
}

impl<S: ImageStore> ImageSearchService<S> {
    pub fn new(store: S, embedder: Arc<dyn ImageEmbedder>) -> Self {
        Self {
            store: Arc::new(store),
            embedder,
            objects: None,
        }
    }

    /// Enable the object-store backed operations
    pub fn with_object_reader(mut self, objects: Arc<dyn ObjectReader>) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn embed(&self, image: &[u8], content_id: &str) -> ImageSearchResult<Embedding> {
        if content_id.trim().is_empty() {
            return Err(ImageSearchError::Validation("content id must not be empty".to_string()));
        }
        if image.is_empty() {
            return Err(ImageSearchError::Validation(format!("image '{}' is empty", content_id)));
        }

        self.embedder.embed(image).await
    }

    /// Embed a query image and append it to the lookup history
    #[instrument(skip(self, image), fields(size = image.len()))]
    pub async fn ingest_lookup(&self, image: &[u8], content_id: &str) -> ImageSearchResult<i64> {
        let embedding = self.embed(image, content_id).await?;
        let id = self.store.append_lookup(content_id, &embedding).await?;

        tracing::info!(lookup_id = id, model = self.embedder.model_name(), "Ingested query image");
        Ok(id)
    }

    /// Embed a catalog image and store it on the existing catalog row
    #[instrument(skip(self, image), fields(size = image.len()))]
    pub async fn ingest_catalog(
        &self,
        catalog_id: i32,
        image: &[u8],
        content_id: &str,
    ) -> ImageSearchResult<i32> {
        let embedding = self.embed(image, content_id).await?;
        self.store
            .set_catalog_embedding(catalog_id, content_id, &embedding)
            .await?;

        tracing::info!("Ingested catalog image");
        Ok(catalog_id)
    }

    async fn neighbors_of(&self, lookup_id: i64, filter: SearchFilter) -> ImageSearchResult<Vec<String>> {
        let mode = filter.mode();
        let paths = self
            .store
            .nearest_neighbors(lookup_id, mode, filter.max_price)
            .await?;

        tracing::info!(lookup_id, mode = mode.as_i32(), results = paths.len(), "Found similar images");
        Ok(paths)
    }

    /// Closest catalog paths for the most recent ingestion of `content_id`
    #[instrument(skip(self))]
    pub async fn find_similar(
        &self,
        content_id: &str,
        filter: SearchFilter,
    ) -> ImageSearchResult<Vec<String>> {
        let lookup_id = self
            .store
            .lookup_id_by_path(content_id)
            .await?
            .ok_or_else(|| ImageSearchError::not_found(format!("lookup path '{}'", content_id)))?;

        self.neighbors_of(lookup_id, filter).await
    }

    /// Ingest a query image, then rank the catalog against the row just written
    #[instrument(skip(self, image), fields(size = image.len()))]
    pub async fn ingest_and_query(
        &self,
        image: &[u8],
        content_id: &str,
        filter: SearchFilter,
    ) -> ImageSearchResult<Vec<String>> {
        let lookup_id = self.ingest_lookup(image, content_id).await?;
        self.neighbors_of(lookup_id, filter).await
    }

    /// Read the query image from object storage, then [`Self::ingest_and_query`]
    #[instrument(skip(self))]
    pub async fn find_similar_images(
        &self,
        bucket: &str,
        object: &str,
        filter: SearchFilter,
    ) -> ImageSearchResult<Vec<String>> {
        let objects = self
            .objects
            .as_ref()
            .ok_or_else(|| ImageSearchError::Config("no object reader configured".to_string()))?;

        let image = objects.read_bytes(bucket, object).await?;
        self.ingest_and_query(&image, object, filter).await
    }

    /// SQL text executed for a filter mode
    #[instrument(skip(self))]
    pub async fn explain_query(&self, mode: i32) -> ImageSearchResult<String> {
        let mode = FilterMode::try_from(mode)?;

        // Fall back to the compiled template when the queries table is unseeded
        Ok(self
            .store
            .query_text(mode)
            .await?
            .unwrap_or_else(|| mode.sql().to_string()))
    }

    pub async fn health(&self) -> ImageSearchResult<()> {
        self.store.health().await
    }
}

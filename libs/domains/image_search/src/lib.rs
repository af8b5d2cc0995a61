//! Image Search Domain
//!
//! Visual similarity retrieval over a product catalog: query images are
//! embedded, appended to an append-only lookup table, and ranked against
//! catalog embeddings by L2 distance with optional stock and price filters.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐
//! │  Handlers   │   │ CatalogBootstrap │  ← HTTP endpoints / batch loader
//! └──────┬──────┘   └────────┬─────────┘
//!        │                   │
//! ┌──────▼───────────────────▼──────┐
//! │      ImageSearchService         │  ← ingestion + retrieval workflows
//! └──────┬──────────┬──────────┬────┘
//!        │          │          │
//! ┌──────▼─────┐ ┌──▼───────┐ ┌▼─────────────┐
//! │ ImageStore │ │ Embedder │ │ ObjectReader │
//! └────────────┘ └──────────┘ └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_image_search::{
//!     handlers, ImageSearchService, InMemoryImageStore, VertexAIConfig, VertexAIEmbedder,
//! };
//!
//! let embedder = VertexAIEmbedder::new(VertexAIConfig::new(
//!     "my-project".to_string(),
//!     "us-central1".to_string(),
//! ));
//! let service = ImageSearchService::new(InMemoryImageStore::new(), Arc::new(embedder));
//! let router = handlers::router(service);
//! ```

pub mod auth;
pub mod bootstrap;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod queries;
pub mod repository;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use bootstrap::{
    BootstrapOptions, BootstrapReport, CatalogBootstrap, DEFAULT_EMBED_DELAY, DEFAULT_IMAGE_LIMIT,
    EmbedReport, ParsedCatalog, parse_catalog_csv,
};
pub use embedding::{ImageEmbedder, VertexAIConfig, VertexAIEmbedder};
pub use error::{ErrorResponse, ImageSearchError, ImageSearchResult};
pub use handlers::ApiDoc;
pub use models::{
    BulkLoadReport, CatalogItem, CatalogRow, EMBEDDING_DIMENSION, Embedding, LookupEntry,
    NEIGHBOR_LIMIT, SearchFilter,
};
pub use postgres::PgImageStore;
pub use queries::{FilterMode, QUERY_TEMPLATES, text_for_mode};
pub use repository::{ImageStore, InMemoryImageStore};
pub use service::ImageSearchService;
pub use storage::{GcsConfig, GcsObjectReader, ObjectReader};

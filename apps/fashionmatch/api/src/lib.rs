//! FashionMatch HTTP API
//!
//! Serves visual similarity search over the product catalog.
//!
//! ## Architecture
//!
//! ```text
//! Web front end
//!   ↓ (HTTP, JSON)
//! axum router (server.rs) ── /health, /ready, /swagger-ui
//!   ↓ /api
//! ImageSearchService (domain layer)
//!   ↓
//! ┌───────────────┬──────────────────┬──────────────┐
//! │ PgImageStore  │ VertexAIEmbedder │ GCS reader   │
//! └───────────────┴──────────────────┴──────────────┘
//!   ↓                 ↓                  ↓
//! PostgreSQL      Vertex AI          Cloud Storage
//!  + pgvector
//! ```
//!
//! ## Modules
//!
//! - `config`: environment-driven application configuration
//! - `health`: liveness and readiness endpoints
//! - `server`: startup, routing and graceful shutdown

pub mod config;
pub mod health;
pub mod server;

pub use config::AppConfig;
pub use server::{build_router, run};

//! HTTP server initialization and lifecycle management
//!
//! - Error reporting and tracing setup
//! - PostgreSQL pool
//! - Vertex AI embedder and Cloud Storage reader
//! - Router assembly (API, health, Swagger UI)
//! - Graceful shutdown bounded by `SHUTDOWN_TIMEOUT_SECS`

use std::future::IntoFuture;
use std::sync::Arc;

use axum::Router;
use core_config::server::ServerConfig;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::FromEnv;
use database::postgres::connect_from_config;
use domain_image_search::{
    GcsObjectReader, ImageSearchService, ImageStore, PgImageStore, VertexAIEmbedder, handlers,
};
use eyre::{Result, WrapErr};
use tokio::signal;
use tokio::sync::Notify;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::health;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FashionMatch API",
        version = "0.1.0",
        description = "Find catalog items that look like an uploaded image"
    ),
    servers(
        (url = "/api", description = "API base path")
    )
)]
pub struct ApiDoc;

fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.merge(domain_image_search::ApiDoc::openapi());
    doc
}

/// Assemble the full application router around an image search service
pub fn build_router<S: ImageStore + 'static>(service: ImageSearchService<S>) -> Router {
    Router::new()
        .nest("/api", handlers::router(service.clone()))
        .merge(health::router(service))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Run the HTTP server
///
/// 1. Installs color-eyre and env-aware tracing
/// 2. Loads [`AppConfig`] from the environment
/// 3. Connects to PostgreSQL
/// 4. Wires the store, embedder and object reader into the service
/// 5. Serves until SIGINT/SIGTERM, then closes the pool
pub async fn run() -> Result<()> {
    install_color_eyre();

    let config = AppConfig::from_env().wrap_err("Failed to load configuration")?;
    init_tracing(&config.environment);

    let db = connect_from_config(config.database.clone())
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;

    let store = PgImageStore::new(db.clone());
    let embedder = Arc::new(VertexAIEmbedder::new(config.vertex.clone()));
    let objects = Arc::new(GcsObjectReader::new(config.gcs.clone()));
    info!(
        project = %config.vertex.project_id,
        location = %config.vertex.location,
        "Vertex AI embedder configured"
    );

    let service = ImageSearchService::new(store, embedder).with_object_reader(objects);
    serve(build_router(service), &config.server).await?;

    db.close().await.wrap_err("Failed to close database pool")?;
    info!("Shutdown complete");
    Ok(())
}

/// Serve `router` until a shutdown signal, giving in-flight requests
/// `shutdown_timeout` to finish.
pub async fn serve(router: Router, server_config: &ServerConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(server_config.address())
        .await
        .wrap_err_with(|| format!("Failed to bind {}", server_config.address()))?;
    info!("Server starting on {}", listener.local_addr()?);

    let signalled = Arc::new(Notify::new());
    let notify = Arc::clone(&signalled);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(async move {
        shutdown_signal().await;
        notify.notify_one();
    });

    let timeout = server_config.shutdown_timeout();
    tokio::select! {
        result = server.into_future() => result.wrap_err("Server encountered an error")?,
        _ = async {
            signalled.notified().await;
            tokio::time::sleep(timeout).await;
        } => warn!(?timeout, "Graceful shutdown timed out, dropping open connections"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use domain_image_search::{
        EMBEDDING_DIMENSION, Embedding, ImageEmbedder, ImageSearchError, ImageSearchResult,
        InMemoryImageStore,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    struct ZeroEmbedder;

    #[async_trait]
    impl ImageEmbedder for ZeroEmbedder {
        fn model_name(&self) -> &'static str {
            "zero"
        }

        async fn embed(&self, _image: &[u8]) -> ImageSearchResult<Embedding> {
            Embedding::new(vec![0.0; EMBEDDING_DIMENSION])
        }
    }

    /// In-memory store whose health check always fails
    #[derive(Clone, Default)]
    struct UnreachableStore(InMemoryImageStore);

    #[async_trait]
    impl ImageStore for UnreachableStore {
        async fn create_schema(&self) -> ImageSearchResult<()> {
            self.0.create_schema().await
        }
        async fn bulk_load(
            &self,
            rows: Vec<domain_image_search::CatalogRow>,
        ) -> ImageSearchResult<domain_image_search::BulkLoadReport> {
            self.0.bulk_load(rows).await
        }
        async fn set_catalog_embedding(&self, id: i32, path: &str, e: &Embedding) -> ImageSearchResult<()> {
            self.0.set_catalog_embedding(id, path, e).await
        }
        async fn append_lookup(&self, path: &str, e: &Embedding) -> ImageSearchResult<i64> {
            self.0.append_lookup(path, e).await
        }
        async fn lookup_id_by_path(&self, path: &str) -> ImageSearchResult<Option<i64>> {
            self.0.lookup_id_by_path(path).await
        }
        async fn nearest_neighbors(
            &self,
            query_id: i64,
            mode: domain_image_search::FilterMode,
            max_price: i32,
        ) -> ImageSearchResult<Vec<String>> {
            self.0.nearest_neighbors(query_id, mode, max_price).await
        }
        async fn catalog_id_by_path(&self, path: &str) -> ImageSearchResult<Option<i32>> {
            self.0.catalog_id_by_path(path).await
        }
        async fn query_text(
            &self,
            mode: domain_image_search::FilterMode,
        ) -> ImageSearchResult<Option<String>> {
            self.0.query_text(mode).await
        }
        async fn health(&self) -> ImageSearchResult<()> {
            Err(ImageSearchError::Storage("connection refused".to_string()))
        }
    }

    fn app() -> Router {
        build_router(ImageSearchService::new(
            InMemoryImageStore::new(),
            Arc::new(ZeroEmbedder),
        ))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["name"], "fashionmatch_api");
    }

    #[tokio::test]
    async fn test_ready_reports_store_failure() {
        let (status, body) = get(app(), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);

        let broken = build_router(ImageSearchService::new(
            UnreachableStore::default(),
            Arc::new(ZeroEmbedder),
        ));
        let (status, body) = get(broken, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], "disconnected");
    }

    #[tokio::test]
    async fn test_api_routes_are_nested() {
        let (status, body) = get(app(), "/api/get_query?mode=1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["query_text"].as_str().unwrap().starts_with("SELECT path"));

        let response = app()
            .oneshot(Request::builder().uri("/get_query?mode=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_openapi_document_lists_domain_paths() {
        let (status, body) = get(app(), "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "FashionMatch API");
        assert!(body["paths"]["/find_similar_images"].is_object());
        assert!(body["paths"]["/get_query"].is_object());
    }
}

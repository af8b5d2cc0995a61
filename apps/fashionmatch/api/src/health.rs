use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use domain_image_search::{ImageSearchService, ImageStore};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub database: &'static str,
}

/// `/health` (process is up) and `/ready` (vector store reachable)
pub fn router<S: ImageStore + 'static>(service: ImageSearchService<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready::<S>))
        .with_state(Arc::new(service))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ready<S: ImageStore>(
    State(service): State<Arc<ImageSearchService<S>>>,
) -> (StatusCode, Json<ReadyResponse>) {
    match service.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                database: "connected",
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    database: "disconnected",
                }),
            )
        }
    }
}

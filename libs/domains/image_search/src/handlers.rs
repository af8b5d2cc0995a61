use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::{ErrorResponse, ImageSearchResult};
use crate::models::{
    FilterParams, FindSimilarParams, QueryTextParams, QueryTextResponse, SimilarImagesResponse,
};
use crate::repository::ImageStore;
use crate::service::ImageSearchService;

pub const TAG: &str = "image-search";

/// OpenAPI documentation for the image search API
#[derive(OpenApi)]
#[openapi(
    paths(find_similar_images, search_uploaded_image, get_query),
    components(schemas(SimilarImagesResponse, QueryTextResponse, ErrorResponse)),
    tags((name = TAG, description = "Visual similarity search over the product catalog"))
)]
pub struct ApiDoc;

/// Create the image search router
pub fn router<S: ImageStore + 'static>(service: ImageSearchService<S>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/find_similar_images", get(find_similar_images::<S>))
        .route("/images/{name}/similar", post(search_uploaded_image::<S>))
        .route("/get_query", get(get_query::<S>))
        .with_state(shared_service)
}

/// Embed an image already uploaded to object storage and return the closest catalog items
#[utoipa::path(
    get,
    path = "/find_similar_images",
    tag = TAG,
    params(FindSimilarParams),
    responses(
        (status = 200, description = "Up to three catalog paths, closest first", body = SimilarImagesResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse),
        (status = 502, description = "Embedding or object storage failure", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn find_similar_images<S: ImageStore>(
    State(service): State<Arc<ImageSearchService<S>>>,
    Query(params): Query<FindSimilarParams>,
) -> ImageSearchResult<Json<SimilarImagesResponse>> {
    let paths = service
        .find_similar_images(&params.landing_repo, &params.image_name, params.to_filter())
        .await?;
    Ok(Json(SimilarImagesResponse { paths }))
}

/// Search with image bytes sent in the request body
#[utoipa::path(
    post,
    path = "/images/{name}/similar",
    tag = TAG,
    params(
        ("name" = String, Path, description = "Name recorded for the query image"),
        FilterParams
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Up to three catalog paths, closest first", body = SimilarImagesResponse),
        (status = 400, description = "Empty image or name", body = ErrorResponse),
        (status = 502, description = "Embedding failure", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn search_uploaded_image<S: ImageStore>(
    State(service): State<Arc<ImageSearchService<S>>>,
    Path(name): Path<String>,
    Query(params): Query<FilterParams>,
    body: Bytes,
) -> ImageSearchResult<Json<SimilarImagesResponse>> {
    let paths = service
        .ingest_and_query(&body, &name, params.to_filter())
        .await?;
    Ok(Json(SimilarImagesResponse { paths }))
}

/// SQL executed for a filter mode (1-4)
#[utoipa::path(
    get,
    path = "/get_query",
    tag = TAG,
    params(QueryTextParams),
    responses(
        (status = 200, description = "Query text", body = QueryTextResponse),
        (status = 404, description = "Unknown mode", body = ErrorResponse)
    )
)]
async fn get_query<S: ImageStore>(
    State(service): State<Arc<ImageSearchService<S>>>,
    Query(params): Query<QueryTextParams>,
) -> ImageSearchResult<Json<QueryTextResponse>> {
    let query_text = service.explain_query(params.mode).await?;
    Ok(Json(QueryTextResponse { query_text }))
}

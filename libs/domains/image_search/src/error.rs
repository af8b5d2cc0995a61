use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ImageSearchError {
    /// Missing catalog id, lookup path/id, or query mode
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection, transaction or write failure in the vector store
    #[error("Storage error: {0}")]
    Storage(String),

    /// The external embedding call failed or returned an unusable payload
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// Malformed bootstrap row, wrong vector dimensionality, bad request input
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ImageSearchResult<T> = Result<T, ImageSearchError>;

impl ImageSearchError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Machine-readable identifier used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::EmbeddingService(_) => "EMBEDDING_SERVICE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ObjectStore(_) => "OBJECT_STORE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::EmbeddingService(_) | Self::ObjectStore(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sea_orm::DbErr> for ImageSearchError {
    fn from(err: sea_orm::DbErr) -> Self {
        ImageSearchError::Storage(err.to_string())
    }
}

impl From<database::DatabaseError> for ImageSearchError {
    fn from(err: database::DatabaseError) -> Self {
        ImageSearchError::Storage(err.to_string())
    }
}

impl From<core_config::ConfigError> for ImageSearchError {
    fn from(err: core_config::ConfigError) -> Self {
        ImageSearchError::Config(err.to_string())
    }
}

impl From<csv::Error> for ImageSearchError {
    fn from(err: csv::Error) -> Self {
        ImageSearchError::Validation(format!("CSV error: {}", err))
    }
}

/// JSON body returned for every failed request
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status code, repeated for log correlation
    pub code: u16,
    /// Machine-readable error identifier
    pub error: String,
    pub message: String,
}

impl IntoResponse for ImageSearchError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error_kind = self.kind(), "{}", self);
        } else {
            tracing::info!(error_kind = self.kind(), "{}", self);
        }

        // Storage internals stay in the logs
        let message = match &self {
            Self::Storage(_) | Self::Config(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.kind().to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ImageSearchError::not_found("lookup path 'a.jpg'").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ImageSearchError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ImageSearchError::EmbeddingService("503".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ImageSearchError::Storage("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_db_error_maps_to_storage() {
        let err: ImageSearchError = sea_orm::DbErr::Custom("pool timed out".into()).into();
        assert!(matches!(err, ImageSearchError::Storage(_)));
    }

    #[test]
    fn test_storage_error_response_hides_details() {
        let response = ImageSearchError::Storage("password auth failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

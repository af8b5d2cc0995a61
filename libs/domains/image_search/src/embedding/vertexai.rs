//! Vertex AI multimodal embedding provider
//!
//! Calls `multimodalembedding@001` through the REST `:predict` endpoint with
//! the image inlined as base64. Authentication uses `GOOGLE_ACCESS_TOKEN` or
//! the GCP metadata server.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use core_config::{ConfigError, FromEnv, env_or_default};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ImageEmbedder;
use crate::auth::GcpTokenSource;
use crate::error::{ImageSearchError, ImageSearchResult};
use crate::models::{EMBEDDING_DIMENSION, Embedding};

pub const MULTIMODAL_MODEL: &str = "multimodalembedding@001";

/// Vertex AI provider configuration
#[derive(Debug, Clone)]
pub struct VertexAIConfig {
    /// GCP Project ID
    pub project_id: String,
    /// GCP Region (e.g., "us-central1")
    pub location: String,
    /// If not provided, the metadata server is asked for a token
    pub access_token: Option<String>,
    /// Overrides `https://{location}-aiplatform.googleapis.com`
    pub endpoint_base: Option<String>,
}

impl VertexAIConfig {
    pub fn new(project_id: String, location: String) -> Self {
        Self {
            project_id,
            location,
            access_token: None,
            endpoint_base: None,
        }
    }

    pub fn with_access_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }

    pub fn with_endpoint_base(mut self, base: String) -> Self {
        self.endpoint_base = Some(base);
        self
    }

    fn endpoint_url(&self, model: &str) -> String {
        let base = self
            .endpoint_base
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.location));
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            base.trim_end_matches('/'),
            self.project_id,
            self.location,
            model
        )
    }
}

impl FromEnv for VertexAIConfig {
    /// - GOOGLE_CLOUD_PROJECT or GCP_PROJECT_ID: required
    /// - VERTEX_AI_LOCATION: defaults to us-central1
    /// - GOOGLE_ACCESS_TOKEN: optional
    /// - VERTEX_AI_ENDPOINT: optional
    fn from_env() -> Result<Self, ConfigError> {
        let project_id = std::env::var("GOOGLE_CLOUD_PROJECT")
            .or_else(|_| std::env::var("GCP_PROJECT_ID"))
            .map_err(|_| ConfigError::MissingEnvVar("GOOGLE_CLOUD_PROJECT or GCP_PROJECT_ID".to_string()))?;

        Ok(Self {
            project_id,
            location: env_or_default("VERTEX_AI_LOCATION", "us-central1"),
            access_token: std::env::var("GOOGLE_ACCESS_TOKEN").ok(),
            endpoint_base: std::env::var("VERTEX_AI_ENDPOINT").ok(),
        })
    }
}

/// Vertex AI image embedder
pub struct VertexAIEmbedder {
    client: Client,
    tokens: GcpTokenSource,
    config: VertexAIConfig,
}

impl VertexAIEmbedder {
    pub fn new(config: VertexAIConfig) -> Self {
        let client = Client::new();
        let tokens = GcpTokenSource::new(client.clone(), config.access_token.clone());
        Self {
            client,
            tokens,
            config,
        }
    }
}

// Vertex AI request/response types

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<ImageInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct ImageInstance {
    image: InlineImage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineImage {
    bytes_base64_encoded: String,
}

#[derive(Debug, Serialize)]
struct PredictParameters {
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<ImagePrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePrediction {
    image_embedding: Option<Vec<f32>>,
}

fn build_request(image: &[u8]) -> PredictRequest {
    PredictRequest {
        instances: vec![ImageInstance {
            image: InlineImage {
                bytes_base64_encoded: STANDARD.encode(image),
            },
        }],
        parameters: PredictParameters {
            dimension: EMBEDDING_DIMENSION,
        },
    }
}

fn extract_embedding(response: PredictResponse) -> ImageSearchResult<Embedding> {
    let values = response
        .predictions
        .into_iter()
        .next()
        .and_then(|p| p.image_embedding)
        .ok_or_else(|| ImageSearchError::EmbeddingService("No image embedding returned".to_string()))?;

    Embedding::new(values).map_err(|e| ImageSearchError::EmbeddingService(e.to_string()))
}

#[async_trait]
impl ImageEmbedder for VertexAIEmbedder {
    fn model_name(&self) -> &'static str {
        MULTIMODAL_MODEL
    }

    async fn embed(&self, image: &[u8]) -> ImageSearchResult<Embedding> {
        let access_token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| ImageSearchError::EmbeddingService(e.to_string()))?;
        let endpoint = self.config.endpoint_url(MULTIMODAL_MODEL);

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(access_token)
            .json(&build_request(image))
            .send()
            .await
            .map_err(|e| ImageSearchError::EmbeddingService(format!("Vertex AI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ImageSearchError::EmbeddingService(format!(
                "Vertex AI API error ({}): {}",
                status, error_text
            )));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| ImageSearchError::EmbeddingService(format!("Malformed Vertex AI response: {}", e)))?;

        extract_embedding(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let config = VertexAIConfig::new("my-project".to_string(), "us-central1".to_string());
        let expected = "https://us-central1-aiplatform.googleapis.com/v1/projects/my-project/locations/us-central1/publishers/google/models/multimodalembedding@001:predict";
        assert_eq!(config.endpoint_url(MULTIMODAL_MODEL), expected);
    }

    #[test]
    fn test_endpoint_override() {
        let config = VertexAIConfig::new("p".to_string(), "europe-west1".to_string())
            .with_endpoint_base("http://localhost:9000/".to_string());
        assert!(config
            .endpoint_url(MULTIMODAL_MODEL)
            .starts_with("http://localhost:9000/v1/projects/p/locations/europe-west1/"));
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(build_request(b"\x89PNG")).unwrap();
        assert_eq!(body["instances"][0]["image"]["bytesBase64Encoded"], "iVBORw==");
        assert_eq!(body["parameters"]["dimension"], 1408);
    }

    #[test]
    fn test_extract_embedding_from_first_prediction() {
        let json = serde_json::json!({
            "predictions": [{ "imageEmbedding": vec![0.25_f32; EMBEDDING_DIMENSION] }]
        });
        let response: PredictResponse = serde_json::from_value(json).unwrap();
        let embedding = extract_embedding(response).unwrap();
        assert_eq!(embedding.as_slice().len(), EMBEDDING_DIMENSION);
    }

    #[test]
    fn test_extract_embedding_wrong_dimension_is_service_error() {
        let json = serde_json::json!({ "predictions": [{ "imageEmbedding": [0.1, 0.2] }] });
        let response: PredictResponse = serde_json::from_value(json).unwrap();
        assert!(matches!(
            extract_embedding(response),
            Err(ImageSearchError::EmbeddingService(_))
        ));
    }

    #[test]
    fn test_extract_embedding_empty_predictions() {
        let response: PredictResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            extract_embedding(response),
            Err(ImageSearchError::EmbeddingService(_))
        ));
    }

    #[tokio::test]
    async fn test_token_failure_is_embedding_service_error() {
        let mut embedder =
            VertexAIEmbedder::new(VertexAIConfig::new("p".to_string(), "us-central1".to_string()));
        // Nothing listens on the discard port
        embedder.tokens = embedder.tokens.with_metadata_url("http://127.0.0.1:9/token");

        let err = embedder.embed(b"img").await.unwrap_err();
        assert!(matches!(err, ImageSearchError::EmbeddingService(_)), "got {:?}", err);
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("GOOGLE_CLOUD_PROJECT", None),
                ("GCP_PROJECT_ID", Some("fallback-project")),
                ("VERTEX_AI_LOCATION", None),
                ("GOOGLE_ACCESS_TOKEN", Some("token")),
                ("VERTEX_AI_ENDPOINT", None),
            ],
            || {
                let config = VertexAIConfig::from_env().unwrap();
                assert_eq!(config.project_id, "fallback-project");
                assert_eq!(config.location, "us-central1");
                assert_eq!(config.access_token.as_deref(), Some("token"));
            },
        );
    }

    #[test]
    fn test_config_from_env_requires_project() {
        temp_env::with_vars_unset(["GOOGLE_CLOUD_PROJECT", "GCP_PROJECT_ID"], || {
            let err = VertexAIConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::MissingEnvVar(_)));
        });
    }
}

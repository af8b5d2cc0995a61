//! Google Cloud access tokens for the Vertex AI and Cloud Storage clients.
//!
//! A token from `GOOGLE_ACCESS_TOKEN` is used as-is (local development);
//! otherwise one is fetched from the metadata server on every call, which is
//! how Cloud Run and GKE workload identity hand out credentials.

use reqwest::Client;
use serde::Deserialize;

use crate::error::{ImageSearchError, ImageSearchResult};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Clone)]
pub struct GcpTokenSource {
    client: Client,
    static_token: Option<String>,
    metadata_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GcpTokenSource {
    pub fn new(client: Client, static_token: Option<String>) -> Self {
        Self {
            client,
            static_token: static_token.filter(|t| !t.trim().is_empty()),
            metadata_url: METADATA_TOKEN_URL.to_string(),
        }
    }

    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    pub fn has_static_token(&self) -> bool {
        self.static_token.is_some()
    }

    /// Bearer token for Google APIs
    pub async fn access_token(&self) -> ImageSearchResult<String> {
        if let Some(ref token) = self.static_token {
            return Ok(token.clone());
        }

        self.metadata_token().await
    }

    async fn metadata_token(&self) -> ImageSearchResult<String> {
        let response = self
            .client
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                ImageSearchError::Config(format!(
                    "Failed to get access token from metadata server: {}. \
                     Set GOOGLE_ACCESS_TOKEN for local development.",
                    e
                ))
            })?;

        if !response.status().is_success() {
            return Err(ImageSearchError::Config(format!(
                "Metadata server refused token request ({})",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ImageSearchError::Config(format!("Failed to parse token response: {}", e)))?;

        Ok(token.access_token)
    }
}

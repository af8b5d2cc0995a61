//! Google Cloud Storage JSON API reader

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::ObjectReader;
use crate::auth::GcpTokenSource;
use crate::error::{ImageSearchError, ImageSearchResult};

const DEFAULT_GCS_BASE_URL: &str = "https://storage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GcsConfig {
    pub base_url: String,
    pub access_token: Option<String>,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GCS_BASE_URL.to_string(),
            access_token: None,
        }
    }
}

impl FromEnv for GcsConfig {
    /// - GCS_BASE_URL: defaults to https://storage.googleapis.com
    /// - GOOGLE_ACCESS_TOKEN: optional, shared with Vertex AI
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_or_default("GCS_BASE_URL", DEFAULT_GCS_BASE_URL),
            access_token: std::env::var("GOOGLE_ACCESS_TOKEN").ok(),
        })
    }
}

pub struct GcsObjectReader {
    client: Client,
    tokens: GcpTokenSource,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectMeta>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

impl GcsObjectReader {
    pub fn new(config: GcsConfig) -> Self {
        let client = Client::new();
        let tokens = GcpTokenSource::new(client.clone(), config.access_token);
        Self {
            client,
            tokens,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(object)
        )
    }

    fn list_url(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(bucket)
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ImageSearchResult<reqwest::Response> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| ImageSearchError::ObjectStore(e.to_string()))?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ImageSearchError::ObjectStore(format!("GCS request failed: {}", e)))
    }
}

fn check_status(status: StatusCode, what: impl FnOnce() -> String) -> ImageSearchResult<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(ImageSearchError::NotFound(what())),
        s => Err(ImageSearchError::ObjectStore(format!("GCS returned {} for {}", s, what()))),
    }
}

fn is_directory_placeholder(name: &str) -> bool {
    name.ends_with('/')
}

#[async_trait]
impl ObjectReader for GcsObjectReader {
    async fn read_bytes(&self, bucket: &str, object: &str) -> ImageSearchResult<Vec<u8>> {
        let response = self.send(self.client.get(self.object_url(bucket, object))).await?;
        check_status(response.status(), || format!("object gs://{}/{}", bucket, object))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageSearchError::ObjectStore(format!("Failed to read object body: {}", e)))?;

        tracing::debug!(bucket, object, size = bytes.len(), "Read object");
        Ok(bytes.to_vec())
    }

    async fn list_objects(&self, bucket: &str) -> ImageSearchResult<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.list_url(bucket))
                .query(&[("fields", "items(name),nextPageToken")]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = self.send(request).await?;
            check_status(response.status(), || format!("bucket gs://{}", bucket))?;

            let page: ObjectList = response
                .json()
                .await
                .map_err(|e| ImageSearchError::ObjectStore(format!("Malformed object listing: {}", e)))?;

            names.extend(
                page.items
                    .into_iter()
                    .map(|o| o.name)
                    .filter(|name| !is_directory_placeholder(name)),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(bucket, count = names.len(), "Listed objects");
        Ok(names)
    }
}

use core_config::server::ServerConfig;
use core_config::{ConfigError, Environment, FromEnv};
use database::postgres::PostgresConfig;
use domain_image_search::{GcsConfig, VertexAIConfig};

/// Everything the API needs, read once at startup and passed to constructors
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: PostgresConfig,
    pub vertex: VertexAIConfig,
    pub gcs: GcsConfig,
}

impl FromEnv for AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            database: PostgresConfig::from_env()?,
            vertex: VertexAIConfig::from_env()?,
            gcs: GcsConfig::from_env()?,
        })
    }
}

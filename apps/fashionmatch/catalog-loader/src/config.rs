//! Configuration for the catalog loader

use core_config::{ConfigError, Environment, FromEnv};
use database::postgres::PostgresConfig;
use domain_image_search::{GcsConfig, VertexAIConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database: PostgresConfig,
    pub vertex: VertexAIConfig,
    pub gcs: GcsConfig,
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            // Bootstrap runs one statement at a time
            database: PostgresConfig::from_env()?.with_pool_size(2, 1),
            vertex: VertexAIConfig::from_env()?,
            gcs: GcsConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_uses_small_pool() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://fm:fm@localhost:5432/fashionmatch")),
                ("GOOGLE_CLOUD_PROJECT", Some("fashion-demo")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.database.max_connections, 2);
                assert_eq!(config.vertex.project_id, "fashion-demo");
            },
        );
    }
}

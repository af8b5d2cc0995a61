use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use tracing::info;

use super::PostgresConfig;
use crate::common::{DatabaseError, DatabaseResult};

/// Open a connection pool using a [`PostgresConfig`]
pub async fn connect_from_config(config: PostgresConfig) -> DatabaseResult<DatabaseConnection> {
    let max_connections = config.max_connections;
    let db = connect_with_options(config.into_connect_options()).await?;
    info!(max_connections, "Connected to PostgreSQL");
    Ok(db)
}

/// Open a connection pool with explicit SeaORM options
pub async fn connect_with_options(options: ConnectOptions) -> DatabaseResult<DatabaseConnection> {
    Database::connect(options)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))
}

/// Enable the pgvector extension (`CREATE EXTENSION IF NOT EXISTS vector`)
///
/// Requires a role allowed to create extensions, or an image that ships with
/// pgvector preinstalled.
pub async fn ensure_vector_extension(db: &DatabaseConnection) -> DatabaseResult<()> {
    db.execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
        .await
        .map_err(|e| DatabaseError::ExtensionUnavailable {
            name: "vector".to_string(),
            details: e.to_string(),
        })?;
    info!("pgvector extension enabled");
    Ok(())
}

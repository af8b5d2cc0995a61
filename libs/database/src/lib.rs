//! PostgreSQL connection management for FashionMatch services.
//!
//! Pool settings come from [`postgres::PostgresConfig`], which is loaded once
//! from the environment and passed to [`postgres::connect_from_config`]. The
//! resulting `DatabaseConnection` is a pool handle: every statement checks a
//! connection out and returns it when the statement (or transaction) ends.
//!
//! ```ignore
//! use core_config::FromEnv;
//! use database::postgres::{self, PostgresConfig};
//!
//! let config = PostgresConfig::from_env()?;
//! let db = postgres::connect_from_config(config).await?;
//! postgres::ensure_vector_extension(&db).await?;
//! ```

pub mod common;
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult};

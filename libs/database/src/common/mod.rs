//! Common utilities shared by the database helpers

pub mod error;

pub use error::{DatabaseError, DatabaseResult};

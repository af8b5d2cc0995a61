//! Object storage collaborators (image bytes and catalog listings)

pub mod gcs;
mod reader;

pub use gcs::{GcsConfig, GcsObjectReader};
#[cfg(test)]
pub use reader::MockObjectReader;
pub use reader::ObjectReader;

//! Image embedding providers

mod provider;
pub mod vertexai;

pub use provider::ImageEmbedder;
#[cfg(test)]
pub use provider::MockImageEmbedder;
pub use vertexai::{VertexAIConfig, VertexAIEmbedder};

mod hashing;
mod text;

use std::sync::Arc;

use crate::domain::ports::EmbeddingService;
use crate::infrastructure::config::{EmbeddingConfig, EmbeddingProvider};

pub use hashing::HashingEmbedding;
pub use text::TextEmbedding;

/// Builds the configured embedding provider once for the whole process.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingService> {
    match config.provider {
        EmbeddingProvider::OpenAi => Arc::new(TextEmbedding::from_config(config)),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedding::new(config.dimension)),
    }
}

use crate::domain::{errors::DomainError, Embedding};
use async_trait::async_trait;

/// Maps text to fixed-dimension vectors. Implementations are not required to
/// normalize their output; callers that need unit vectors normalize themselves.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError>;

    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;
}

use crate::domain::{errors::DomainError, SearchHit};
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embeds and appends `texts`, pairing each with the source at the same position.
    async fn add_texts(&self, texts: &[String], sources: &[String]) -> Result<(), DomainError>;

    /// Returns up to `k` hits ordered by descending similarity to `query`.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, DomainError>;

    async fn len(&self) -> usize;

    fn dimension(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

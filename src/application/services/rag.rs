use std::sync::Arc;
use tracing::instrument;

use crate::domain::{ports::VectorStore, DomainError, SearchHit};

/// Retrieval side of the pipeline: top-k lookups against the vector store.
pub struct RagService {
    vector_store: Arc<dyn VectorStore>,
    default_top_k: usize,
}

impl RagService {
    pub fn new(vector_store: Arc<dyn VectorStore>, default_top_k: usize) -> Self {
        Self {
            vector_store,
            default_top_k,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    #[instrument(skip(self, query))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>, DomainError> {
        self.retrieve_top_k(query, self.default_top_k).await
    }

    #[instrument(skip(self, query))]
    pub async fn retrieve_top_k(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        self.vector_store.search(query, top_k).await
    }
}

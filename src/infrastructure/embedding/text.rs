use async_trait::async_trait;
use rig::client::{EmbeddingsClient, ProviderClient};
use rig::embeddings::EmbeddingModel as _;
use rig::providers::openai;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::EmbeddingConfig;

/// Requests per call are capped to stay under the provider's document limit.
const MAX_BATCH: usize = 512;

/// Remote embedding provider backed by the OpenAI embeddings API.
pub struct TextEmbedding {
    model: openai::EmbeddingModel,
    model_name: String,
    dimension: usize,
}

impl TextEmbedding {
    /// Builds the client once from `OPENAI_API_KEY`.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let client = openai::Client::from_env();
        Self {
            model: client.embedding_model(&config.model),
            model_name: config.model.clone(),
            dimension: config.dimension,
        }
    }

    fn convert(embedding: rig::embeddings::Embedding) -> Embedding {
        Embedding::new(embedding.vec.into_iter().map(|x| x as f32).collect())
    }
}

#[async_trait]
impl EmbeddingService for TextEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.model
            .embed_text(text)
            .await
            .map(Self::convert)
            .map_err(|e| DomainError::external(e.to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(model = %self.model_name, texts = texts.len(), "embedding batch");

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            let embeddings = self
                .model
                .embed_texts(batch.iter().map(|t| t.to_string()))
                .await
                .map_err(|e| DomainError::external(e.to_string()))?;

            if embeddings.len() != batch.len() {
                return Err(DomainError::external(format!(
                    "embedding provider returned {} vectors for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }
            out.extend(embeddings.into_iter().map(Self::convert));
        }

        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

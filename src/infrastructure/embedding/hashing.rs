use async_trait::async_trait;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};

/// Offline embedding provider based on feature hashing of lowercase word
/// tokens. Texts that share words get a positive inner product, which is
/// enough for local runs and tests without model credentials.
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut vec = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return Embedding::new(vec);
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a_64(token.to_lowercase().as_bytes());
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vec[slot] += sign;
        }

        Embedding::new(vec).normalized()
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        Ok(self.embed_one(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_is_deterministic_and_normalized() {
        let embedder = HashingEmbedding::new(64);

        let a = embedder.embed("The cat sat on the mat").await.unwrap();
        let b = embedder.embed("the CAT sat on the mat").await.unwrap();

        assert_eq!(a, b);
        assert!((a.norm() - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let embedder = HashingEmbedding::new(256);

        let query = embedder.embed("cat mat").await.unwrap();
        let batch = embedder
            .embed_batch(&["The cat sat on the mat.", "Dogs are loyal companions."])
            .await
            .unwrap();

        assert!(query.dot(batch[0].as_slice()) > query.dot(batch[1].as_slice()));
    }

    #[tokio::test]
    async fn test_text_without_tokens_is_zero_vector() {
        let embedder = HashingEmbedding::new(8);
        let v = embedder.embed("  ...  ").await.unwrap();
        assert_eq!(v.norm(), 0.0);
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::domain::{
    chunk_text,
    ports::{TextExtractor, VectorStore},
    DomainError, DEFAULT_CHUNK_CHARS, DEFAULT_CHUNK_OVERLAP,
};

/// Ingestion side of the pipeline: extract, chunk, and append to the store.
pub struct DocumentService {
    store: Arc<dyn VectorStore>,
    extractor: Arc<dyn TextExtractor>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentService {
    pub fn new(store: Arc<dyn VectorStore>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            store,
            extractor,
            chunk_size: DEFAULT_CHUNK_CHARS,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Chunks `content` and stores every chunk under `source`. Returns the
    /// number of chunks added; blank content adds nothing.
    #[instrument(skip(self, content), fields(len = content.len()))]
    pub async fn ingest_text(&self, source: &str, content: &str) -> Result<usize, DomainError> {
        let chunks = chunk_text(content, self.chunk_size, self.chunk_overlap);
        if chunks.is_empty() {
            return Ok(0);
        }

        let sources = vec![source.to_string(); chunks.len()];
        self.store.add_texts(&chunks, &sources).await?;

        info!(source, chunks = chunks.len(), "document ingested");
        Ok(chunks.len())
    }

    /// Extracts text from a stored file and ingests it under `source`.
    #[instrument(skip(self))]
    pub async fn ingest_file(
        &self,
        path: &Path,
        source: &str,
        declared_mime: Option<&str>,
    ) -> Result<usize, DomainError> {
        let text = self.extract(path.to_path_buf(), declared_mime.map(str::to_string)).await?;
        if text.trim().is_empty() {
            info!(source, "no text extracted, skipping");
            return Ok(0);
        }
        self.ingest_text(source, &text).await
    }

    async fn extract(
        &self,
        path: PathBuf,
        declared_mime: Option<String>,
    ) -> Result<String, DomainError> {
        let extractor = self.extractor.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&path, declared_mime.as_deref()))
            .await
            .map_err(|e| DomainError::internal(format!("extraction task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{DocumentExtractor, HashingEmbedding, PersistedVectorStore};
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> (DocumentService, Arc<PersistedVectorStore>) {
        let store = Arc::new(
            PersistedVectorStore::open(
                dir.path().join("faiss.index"),
                dir.path().join("meta.jsonl"),
                Arc::new(HashingEmbedding::new(32)),
            )
            .unwrap(),
        );
        let service = DocumentService::new(store.clone(), Arc::new(DocumentExtractor));
        (service, store)
    }

    #[tokio::test]
    async fn test_ingest_text_chunks_and_stores() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir);
        let service = service.with_chunking(10, 2);

        let added = service
            .ingest_text("notes.txt", "abcdefghijklmnopqrstuvwxyz")
            .await
            .unwrap();

        assert_eq!(added, 3);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_ingest_blank_text_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir);

        assert_eq!(service.ingest_text("empty.txt", "  \n ").await.unwrap(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_ingest_file_uses_source_name() {
        let dir = TempDir::new().unwrap();
        let (service, store) = service(&dir);
        let path = dir.path().join("doc1.txt");
        std::fs::write(&path, "The cat sat on the mat.").unwrap();

        let added = service
            .ingest_file(&path, "doc1.txt", Some("text/plain"))
            .await
            .unwrap();

        assert_eq!(added, 1);
        let hits = store.search("cat", 1).await.unwrap();
        assert_eq!(hits[0].source, "doc1.txt");
        assert_eq!(hits[0].text, "The cat sat on the mat.");
    }
}

use std::sync::Arc;

use crate::application::{ChatService, DocumentService, RagService};
use crate::domain::{
    ports::{EmbeddingService, LlmService, VectorStore},
    DomainError,
};
use crate::infrastructure::{AppConfig, DocumentExtractor, PersistedVectorStore, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub document_service: Arc<DocumentService>,
    pub rag_service: Arc<RagService>,
    pub chat_service: Arc<ChatService>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Opens the vector store and wires every service around the given providers.
    pub fn build(
        config: AppConfig,
        embedder: Arc<dyn EmbeddingService>,
        llm: Arc<dyn LlmService>,
    ) -> Result<Self, DomainError> {
        let storage = &config.config.storage;
        let store: Arc<dyn VectorStore> = Arc::new(PersistedVectorStore::open(
            &storage.index_file,
            &storage.meta_file,
            embedder,
        )?);
        Ok(Self::with_store(config, store, llm))
    }

    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmService>,
    ) -> Self {
        let rag = &config.config.rag;
        let document_service = Arc::new(
            DocumentService::new(store.clone(), Arc::new(DocumentExtractor))
                .with_chunking(rag.chunk_size, rag.chunk_overlap),
        );
        let rag_service = Arc::new(RagService::new(store, rag.top_k));
        let chat_service = Arc::new(ChatService::new(
            rag_service.clone(),
            llm,
            config.prompts.clone(),
        ));

        let limits = &config.config.rate_limit;
        let rate_limiter = limits
            .enabled
            .then(|| Arc::new(RateLimiter::with_system_clock(limits.rps)));

        Self {
            document_service,
            rag_service,
            chat_service,
            rate_limiter,
            config: Arc::new(config),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<Arc<RateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

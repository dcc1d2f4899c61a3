use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::application::RagService;
use crate::domain::{ports::LlmService, DomainError, SearchHit};
use crate::infrastructure::PromptsConfig;

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub text: String,
    pub context_docs: Vec<SearchHit>,
}

/// Answers a question from the top-k retrieved chunks.
pub struct ChatService {
    rag: Arc<RagService>,
    llm: Arc<dyn LlmService>,
    prompts: PromptsConfig,
}

impl ChatService {
    pub fn new(rag: Arc<RagService>, llm: Arc<dyn LlmService>, prompts: PromptsConfig) -> Self {
        Self { rag, llm, prompts }
    }

    #[instrument(skip(self, query))]
    pub async fn answer(&self, query: &str) -> Result<ChatAnswer, DomainError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::validation("Empty query"));
        }

        let context_docs = self.rag.retrieve(query).await?;
        let prompt = self.build_prompt(query, &context_docs);
        let text = self.llm.generate(&self.prompts.system, &prompt).await?;

        Ok(ChatAnswer { text, context_docs })
    }

    fn build_prompt(&self, query: &str, docs: &[SearchHit]) -> String {
        let context = if docs.is_empty() {
            self.prompts.no_context.clone()
        } else {
            docs.iter()
                .enumerate()
                .map(|(i, d)| format!("[{}] (source: {})\n{}", i + 1, d.source, d.text))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        format!("Context:\n{context}\n\nQuestion: {query}\nAnswer:")
    }
}

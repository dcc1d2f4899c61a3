use crate::domain::errors::DomainError;
use async_trait::async_trait;

/// Chat-completion backend that writes the final answer.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Generates a reply to `prompt` under the `system` instructions. An empty
    /// `system` means no preamble.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, DomainError>;
}

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::anthropic;
use tracing::instrument;

use crate::domain::{ports::LlmService, DomainError};
use crate::infrastructure::config::LlmConfig;

pub struct AnthropicLlm {
    client: anthropic::Client,
    model: String,
    max_tokens: u64,
    temperature: f64,
}

impl AnthropicLlm {
    /// Builds the client once from `ANTHROPIC_API_KEY`.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            client: anthropic::Client::from_env(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LlmService for AnthropicLlm {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, DomainError> {
        let mut builder = self
            .client
            .agent(&self.model)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature);
        if !system.is_empty() {
            builder = builder.preamble(system);
        }

        builder
            .build()
            .prompt(prompt)
            .await
            .map_err(|e| DomainError::external(e.to_string()))
    }
}

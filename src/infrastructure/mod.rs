pub mod config;
pub mod embedding;
pub mod extract;
pub mod llm;
pub mod rate_limit;
pub mod uploads;
pub mod vector_store;

pub use config::{AppConfig, Config, PromptsConfig};
pub use embedding::{embedder_from_config, HashingEmbedding, TextEmbedding};
pub use extract::DocumentExtractor;
pub use llm::AnthropicLlm;
pub use rate_limit::{Clock, RateLimiter, SystemClock};
pub use vector_store::{FlatIndex, PersistedVectorStore};

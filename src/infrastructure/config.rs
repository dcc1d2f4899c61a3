use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::domain::{DEFAULT_CHUNK_CHARS, DEFAULT_CHUNK_OVERLAP};

pub const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Settings plus prompt texts, loaded from YAML and then overridden by env.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub config: Config,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub index_file: PathBuf,
    pub meta_file: PathBuf,
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAi,
    Hashing,
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "hashing" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub rps: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub system: String,
    pub no_context: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            docs_dir: PathBuf::from("data/documents"),
            index_file: PathBuf::from("data/embeddings/faiss.index"),
            meta_file: PathBuf::from("data/embeddings/meta.jsonl"),
            max_upload_mb: 50,
        }
    }
}

impl StorageConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            chunk_size: DEFAULT_CHUNK_CHARS,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 3.0,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: "You are a helpful assistant. Answer the question using the provided \
                     context. If the context does not contain the answer, say you don't know."
                .to_string(),
            no_context: "No relevant documents were found.".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `APP_CONFIG` (or the default path) if the file exists, then applies
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies the env-style overrides returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let c = &mut self.config;

        if let Some(v) = lookup("SERVER_HOST") {
            c.server.host = v;
        }
        override_parsed(&lookup, "SERVER_PORT", &mut c.server.port)?;

        if let Some(v) = lookup("DATA_DIR") {
            c.storage.data_dir = v.into();
        }
        if let Some(v) = lookup("DOCS_DIR") {
            c.storage.docs_dir = v.into();
        }
        if let Some(v) = lookup("INDEX_FILE") {
            c.storage.index_file = v.into();
        }
        if let Some(v) = lookup("META_FILE") {
            c.storage.meta_file = v.into();
        }
        override_parsed(&lookup, "MAX_UPLOAD_MB", &mut c.storage.max_upload_mb)?;

        if let Some(v) = lookup("EMBED_PROVIDER") {
            c.embedding.provider = v.parse().map_err(|_| ConfigError::Invalid {
                key: "EMBED_PROVIDER",
                value: v,
            })?;
        }
        if let Some(v) = lookup("EMBED_MODEL") {
            c.embedding.model = v;
        }
        override_parsed(&lookup, "EMBED_DIM", &mut c.embedding.dimension)?;

        if let Some(v) = lookup("LLM_MODEL") {
            c.llm.model = v;
        }
        override_parsed(&lookup, "MAX_GEN_TOKENS", &mut c.llm.max_tokens)?;
        override_parsed(&lookup, "TEMP", &mut c.llm.temperature)?;

        override_parsed(&lookup, "MAX_CTX_DOCS", &mut c.rag.top_k)?;
        override_parsed(&lookup, "CHUNK_SIZE", &mut c.rag.chunk_size)?;
        override_parsed(&lookup, "CHUNK_OVERLAP", &mut c.rag.chunk_overlap)?;

        if let Some(v) = lookup("RATE_LIMIT") {
            c.rate_limit.enabled = v.trim().eq_ignore_ascii_case("true");
        }
        override_parsed(&lookup, "RATE_LIMIT_RPS", &mut c.rate_limit.rps)?;

        if let Some(v) = lookup("CORS_ORIGINS") {
            c.cors.allowed_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value })?;
    }
    Ok(())
}

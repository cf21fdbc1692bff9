//! Configuration for the retrieval and routing engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{KnowledgeSourceDescriptor, SourceType};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Retrieval and generation tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Result cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Answer generator (Ollama) configuration
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Knowledge source gateway configuration
    #[serde(default)]
    pub knowledge_sources: KnowledgeSourceConfig,
    /// Correction store configuration
    #[serde(default)]
    pub corrections: CorrectionConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: EngineConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.cache.ttl()?;
        Ok(config)
    }

    /// Override endpoints and paths from `KB_RAG_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("KB_RAG_GENERATOR_URL") {
            self.generator.base_url = url;
        }
        if let Ok(model) = std::env::var("KB_RAG_GENERATOR_MODEL") {
            self.generator.model = model;
        }
        if let Ok(url) = std::env::var("KB_RAG_SOURCES_URL") {
            self.knowledge_sources.base_url = url;
        }
        if let Ok(path) = std::env::var("KB_RAG_DATABASE_PATH") {
            self.corrections.database_path = PathBuf::from(path);
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned by multi-strategy retrieval (default: 8)
    pub default_k: usize,
    /// Timeout for a single gateway or generator call (default: 30s)
    pub call_timeout_secs: u64,
    /// Timeout for one target's whole retrieval + synthesis (default: 60s)
    pub target_timeout_secs: u64,
    /// Max tokens for query paraphrasing
    pub expansion_max_tokens: u32,
    /// Temperature for query paraphrasing
    pub expansion_temperature: f32,
    /// Max tokens for HyDE, relationship analysis and answer synthesis
    pub generation_max_tokens: u32,
    /// Max tokens for SQL optimization
    pub optimization_max_tokens: u32,
    /// Temperature for factual generation
    pub generation_temperature: f32,
    /// Maximum characters of a secondary answer appended to the merged answer
    pub excerpt_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 8,
            call_timeout_secs: 30,
            target_timeout_secs: 60,
            expansion_max_tokens: 1500,
            expansion_temperature: 0.7,
            generation_max_tokens: 4000,
            optimization_max_tokens: 3000,
            generation_temperature: 0.2,
            excerpt_chars: 200,
        }
    }
}

impl RetrievalConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn target_timeout(&self) -> Duration {
        Duration::from_secs(self.target_timeout_secs)
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable memoization of retrieval results
    pub enabled: bool,
    /// Entry time-to-live in seconds (default: 3600)
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Entry time-to-live; rejects values chrono cannot represent
    pub fn ttl(&self) -> Result<chrono::Duration> {
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| Error::Config(format!("cache ttl_secs {} is out of range", self.ttl_secs)))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
        }
    }
}

/// Answer generator (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Knowledge source gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSourceConfig {
    /// Base URL of the retrieval service fronting the knowledge sources
    pub base_url: String,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
    /// Default descriptors used by single-mode queries
    pub descriptors: Vec<KnowledgeSourceDescriptor>,
}

impl Default for KnowledgeSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            timeout_secs: 30,
            descriptors: vec![KnowledgeSourceDescriptor::new(
                SourceType::Database,
                "default-database",
            )],
        }
    }
}

/// Correction store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// SQLite database holding corrections, training data and improvement logs
    pub database_path: PathBuf,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        let database_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kb-rag")
            .join("corrections.db");

        Self { database_path }
    }
}

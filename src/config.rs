use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Top-level configuration value object.
///
/// Constructed once (from [`load_config`] or by hand) and passed by
/// reference to every component constructor. Components never consult
/// global state or the environment; credentials live in the provider
/// sections and are checked at the first provider call.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub rerank: RerankConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorpusConfig {
    pub root: PathBuf,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/docs"),
            include_globs: vec!["**/*.txt".to_string(), "**/*.md".to_string()],
            exclude_globs: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the persisted vector store, the manifest, and the
    /// ingestion lock file.
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/index"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target window length in whitespace words.
    pub target_tokens: usize,
    /// Overlap between consecutive windows, clamped to target/3 at use.
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: 450,
            overlap_tokens: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of hits per query.
    pub top_k: usize,
    /// Relevance/diversity trade-off for MMR re-selection.
    pub mmr_lambda: f32,
    /// Abstain when the best final hit scores below this.
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            mmr_lambda: 0.7,
            min_score: 0.25,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RerankConfig {
    /// Gates the rerank stage of the retrieval pipeline.
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.jina.ai".to_string(),
            model: "jina-reranker-v2-base-multilingual".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Timeout for the full answer-generation call.
    pub timeout_secs: u64,
    /// Shorter timeout for the auxiliary compression call.
    pub compress_timeout_secs: u64,
    /// Compress retrieved passages into evidence bullets before answering.
    pub compress_context: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
            temperature: 0.2,
            top_p: 0.95,
            max_tokens: 512,
            timeout_secs: 60,
            compress_timeout_secs: 30,
            compress_context: false,
        }
    }
}

/// Parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;

    if config.chunking.target_tokens == 0 {
        return Err(Error::Config("chunking.target_tokens must be > 0".into()));
    }

    if config.retrieval.top_k < 1 {
        return Err(Error::Config("retrieval.top_k must be >= 1".into()));
    }

    if !(0.0..=1.0).contains(&config.retrieval.mmr_lambda) {
        return Err(Error::Config(
            "retrieval.mmr_lambda must be in [0.0, 1.0]".into(),
        ));
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        return Err(Error::Config(
            "generation.temperature must be in [0.0, 2.0]".into(),
        ));
    }

    Ok(config)
}

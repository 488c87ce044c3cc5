//! TOML configuration.
//!
//! Every field has a default, so an absent config file yields a fully
//! working local setup (store under `./askdoc_data`, embeddings and
//! answering via OpenAI). See `askdoc.example.toml` for a commented
//! example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use askdoc_core::chunk::{DEFAULT_CHUNK_SIZE, DEFAULT_MIN_CHUNK, DEFAULT_OVERLAP};
use askdoc_core::engine::RetrievalParams;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub answerer: AnswererConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for the catalog and all per-document artifacts.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./askdoc_data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_chunk")]
    pub min_chunk: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            min_chunk: default_min_chunk(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}
fn default_min_chunk() -> usize {
    DEFAULT_MIN_CHUNK
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Fewer results than this from a stage escalates to the next one.
    #[serde(default = "default_min_results")]
    pub min_results: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_results: default_min_results(),
            score_threshold: default_score_threshold(),
            max_results: default_max_results(),
        }
    }
}

fn default_min_results() -> usize {
    3
}
fn default_score_threshold() -> f64 {
    0.05
}
fn default_max_results() -> usize {
    15
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            min_results: self.min_results,
            score_threshold: self.score_threshold,
            max_results: self.max_results,
            ..RetrievalParams::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswererConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_answerer_provider")]
    pub provider: String,
    #[serde(default = "default_answerer_model")]
    pub model: String,
    /// Retrieved chunks included in the answering prompt.
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,
    #[serde(default = "default_answer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnswererConfig {
    fn default() -> Self {
        Self {
            provider: default_answerer_provider(),
            model: default_answerer_model(),
            max_context_chunks: default_max_context_chunks(),
            timeout_secs: default_answer_timeout_secs(),
        }
    }
}

fn default_answerer_provider() -> String {
    "openai".to_string()
}
fn default_answerer_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_context_chunks() -> usize {
    5
}
fn default_answer_timeout_secs() -> u64 {
    60
}

/// Load configuration from `path`, falling back to the built-in
/// defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }
    if config.retrieval.max_results < 1 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if config.embedding.provider == "openai" && config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0 when provider is 'openai'");
    }
    match config.answerer.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown answerer provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

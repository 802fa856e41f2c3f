//! Configuration for the triage pipeline.
//!
//! Loads settings from a TOML file or uses defaults. Every field has a
//! serde default so partial config files stay valid across upgrades.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::TriageError;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Base URL of the local Ollama host
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Preferred chat model for structured classification
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Fallback chat model when the primary is not installed
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Sentence-embedding model (corpus, queries, prototypes)
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Minimum interval between model calls in seconds
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: f64,

    /// Chat call timeout in seconds
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,

    /// Embedding call timeout in seconds
    #[serde(default = "default_embed_timeout")]
    pub embed_timeout_secs: u64,

    /// Sampling temperature for classification calls
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Nucleus sampling top-p
    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Maximum tokens to generate per classification call
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,

    /// Cosine threshold for accepting a prototype match
    #[serde(default = "default_prototype_threshold")]
    pub prototype_threshold: f32,

    /// How many knowledge examples to retrieve for prompt context
    #[serde(default = "default_retrieve_k")]
    pub retrieve_k: usize,

    /// Optional path to a JSON knowledge corpus (embedded default otherwise)
    #[serde(default)]
    pub knowledge_path: Option<PathBuf>,

    /// Whether to cache corpus embeddings on disk, keyed by corpus content
    #[serde(default = "default_cache_embeddings")]
    pub cache_embeddings: bool,
}

fn default_ollama_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_primary_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_fallback_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_min_interval() -> f64 {
    3.0
}

fn default_chat_timeout() -> u64 {
    45
}

fn default_embed_timeout() -> u64 {
    15
}

fn default_temperature() -> f64 {
    0.1
}

fn default_top_p() -> f64 {
    0.9
}

fn default_num_predict() -> u32 {
    150
}

fn default_prototype_threshold() -> f32 {
    0.55
}

fn default_retrieve_k() -> usize {
    3
}

fn default_cache_embeddings() -> bool {
    true
}

impl Default for TriageConfig {
    fn default() -> Self {
        // serde defaults are the single source of truth
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl TriageConfig {
    /// Load config from a TOML file, falling back to defaults when the
    /// file is missing. A file that exists but does not parse is an
    /// error: serving with a half-read config is worse than not starting.
    pub fn load(path: &Path) -> Result<Self, TriageError> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| TriageError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

//! Error types for the triage pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Ollama error: {0}")]
    Ollama(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for TriageError {
    fn from(e: reqwest::Error) -> Self {
        TriageError::Ollama(e.to_string())
    }
}

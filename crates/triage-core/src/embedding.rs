//! Embedding backend abstraction.
//!
//! Production code embeds through the local Ollama embeddings endpoint.
//! Test code swaps in a deterministic fake through the same trait, so
//! retrieval and prototype classification stay testable without a model
//! host.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::TriageError;
use crate::schemas::{OllamaEmbeddingsRequest, OllamaEmbeddingsResponse};

/// Text-to-vector backend. One fixed model per instance; the same
/// instance serves corpus indexing, query embedding, and prototype
/// construction so all vectors live in one space.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, fixed dimension.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TriageError>;
}

/// Embedder backed by the local Ollama host.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TriageError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let request = OllamaEmbeddingsRequest {
                model: self.model.clone(),
                prompt: text.clone(),
            };
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| TriageError::Embedding(e.to_string()))?;
            if !response.status().is_success() {
                return Err(TriageError::Embedding(format!(
                    "embeddings endpoint returned {}",
                    response.status()
                )));
            }
            let parsed: OllamaEmbeddingsResponse = response
                .json()
                .await
                .map_err(|e| TriageError::Embedding(e.to_string()))?;
            if parsed.embedding.is_empty() {
                return Err(TriageError::Embedding(format!(
                    "empty embedding for {} chars of input",
                    text.len()
                )));
            }
            vectors.push(parsed.embedding);
        }
        debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(vectors)
    }
}

/// Cosine similarity. Zero vectors score 0.0 rather than NaN.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cosine_identical() {
        let v = vec![0.3, -0.5, 0.8];
        assert_relative_eq!(cosine(&v, &v), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert_relative_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_opposite() {
        assert_relative_eq!(cosine(&[1.0, 2.0], &[-1.0, -2.0]), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}

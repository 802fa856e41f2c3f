//! HTTP client for the local Ollama API.
//!
//! Endpoints used:
//! - GET /api/tags - list installed models
//! - POST /api/chat - structured classification calls
//! - POST /api/generate - raw unvalidated generation
//!
//! The `ChatBackend` trait is the seam the rest of the pipeline talks
//! through; tests substitute scripted implementations.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::TriageError;
use crate::extract::truncate_chars;
use crate::schemas::{
    OllamaChatRequest, OllamaChatResponse, OllamaGenerateRequest, OllamaGenerateResponse,
    OllamaMessage, OllamaOptions, TagsResponse,
};

/// Timeout for the cheap availability/tags probes
const TAGS_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat-completion backend for the generative classifier.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Names of the models installed on the host.
    async fn list_models(&self) -> Result<Vec<String>, TriageError>;

    /// One system/user chat turn; returns the raw content string.
    async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
        options: OllamaOptions,
    ) -> Result<String, TriageError>;

    /// Plain completion without a system message or schema contract.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, TriageError>;
}

/// Production backend against a local Ollama host.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Check if the Ollama host answers at all.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.client
            .get(&url)
            .timeout(TAGS_TIMEOUT)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn list_models(&self) -> Result<Vec<String>, TriageError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(TAGS_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TriageError::Ollama(format!(
                "tags endpoint returned {}",
                response.status()
            )));
        }
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
        options: OllamaOptions,
    ) -> Result<String, TriageError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = OllamaChatRequest {
            model: model.to_string(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            stream: false,
            options: Some(options),
        };

        info!("[>]  LLM CALL [{}]", model);
        debug!(
            "[U]  USER PROMPT ({} chars): {}",
            user.len(),
            truncate_chars(user, 500)
        );

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("[-]  Ollama error {}: {}", status, error_text);
            return Err(TriageError::Ollama(format!(
                "chat endpoint returned {status}: {error_text}"
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await?;
        debug!(
            "[<]  LLM RESPONSE ({} chars)",
            chat_response.message.content.len()
        );
        Ok(chat_response.message.content)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, TriageError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = OllamaGenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: 0.1,
                top_p: 0.9,
                num_predict: max_tokens,
            }),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(TriageError::Ollama(format!(
                "generate endpoint returned {}",
                response.status()
            )));
        }
        let parsed: OllamaGenerateResponse = response.json().await?;
        Ok(parsed.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_lists_no_models() {
        // Nothing listens on this port; the call must fail fast, not hang.
        let backend = OllamaBackend::new("http://127.0.0.1:1", Duration::from_secs(2));
        assert!(backend.list_models().await.is_err());
        assert!(!backend.is_available().await);
    }

    #[tokio::test]
    async fn test_multibyte_prompt_does_not_panic() {
        // Prompt logging must cut on char boundaries: a corpus loaded
        // from disk can put multibyte instructions into the prompt.
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::sink)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let backend = OllamaBackend::new("http://127.0.0.1:1", Duration::from_secs(2));
        let prompt = "\u{e9}".repeat(600);
        let options = OllamaOptions {
            temperature: 0.1,
            top_p: 0.9,
            num_predict: 150,
        };
        // Host is unreachable: an Err is fine, a panic is not
        assert!(backend
            .chat("llama3.2:3b", "system", &prompt, options)
            .await
            .is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = OllamaBackend::new("http://127.0.0.1:11434/", Duration::from_secs(1));
        assert_eq!(backend.base_url, "http://127.0.0.1:11434");
    }
}

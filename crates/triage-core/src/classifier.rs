//! Generative classifier client.
//!
//! Wraps a chat backend with model selection, prompt construction, and
//! the layered output recovery from `extract`. The structured path never
//! propagates a backend error: every failure degrades to a keyword-
//! derived fallback so callers always get a full analysis.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::TriageConfig;
use crate::error::TriageError;
use crate::extract::{self, truncate_chars, GENERIC_RESPONSE};
use crate::ollama::ChatBackend;
use crate::rules::client_fallback;
use crate::schemas::{
    Category, DetailedClassification, OllamaOptions, RetrievedExample, TicketAnalysis,
};

const SYSTEM_PROMPT: &str = "Return JSON with: category, subcategory, summary, response.\n\
Categories: ACCOUNT, ORDER, BILLING, TECHNICAL, SUBSCRIPTION, OTHER";

/// Whole-object capture for the detailed path's looser contract.
static WHOLE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

pub struct GenerativeClassifier {
    backend: Arc<dyn ChatBackend>,
    config: TriageConfig,
    /// Selected model name, resolved once per process
    model: OnceCell<String>,
}

impl GenerativeClassifier {
    pub fn new(backend: Arc<dyn ChatBackend>, config: TriageConfig) -> Self {
        Self {
            backend,
            config,
            model: OnceCell::new(),
        }
    }

    /// Resolve which installed model to use. Preference order: configured
    /// primary, configured fallback, first enumerated, then the primary
    /// name anyway. Connectivity failure here is logged, not fatal - the
    /// chat call will surface it if it persists.
    pub async fn model(&self) -> &str {
        self.model
            .get_or_init(|| async {
                match self.backend.list_models().await {
                    Ok(models) => {
                        if models.iter().any(|m| m == &self.config.primary_model) {
                            info!("Using preferred model {}", self.config.primary_model);
                            self.config.primary_model.clone()
                        } else if models.iter().any(|m| m == &self.config.fallback_model) {
                            info!(
                                "{} not installed, using {}",
                                self.config.primary_model, self.config.fallback_model
                            );
                            self.config.fallback_model.clone()
                        } else if let Some(first) = models.first() {
                            info!("Using first available model {}", first);
                            first.clone()
                        } else {
                            warn!("No models enumerated, using preferred anyway");
                            self.config.primary_model.clone()
                        }
                    }
                    Err(e) => {
                        warn!("Could not list models ({e}), using preferred");
                        self.config.primary_model.clone()
                    }
                }
            })
            .await
    }

    fn options(&self) -> OllamaOptions {
        OllamaOptions {
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            num_predict: self.config.num_predict,
        }
    }

    /// Build the user prompt: retrieved examples as inline context plus
    /// the ticket text and the required output shape.
    fn build_prompt(text: &str, examples: &[RetrievedExample]) -> String {
        let context: String = examples
            .iter()
            .map(|ex| format!("- {} => {}\n", ex.entry.instruction, ex.entry.response))
            .collect();
        format!(
            "You are an expert helpdesk classifier.\n\
             Use these examples as context:\n\
             {context}\n\
             Ticket: \"{text}\"\n\n\
             Return ONLY JSON with:\n\
             {{\n\
               \"category\": \"ACCOUNT|ORDER|BILLING|TECHNICAL|SUBSCRIPTION|OTHER\",\n\
               \"subcategory\": \"specific_issue_type\",\n\
               \"summary\": \"short summary\",\n\
               \"response\": \"helpful short reply\"\n\
             }}\n"
        )
    }

    /// Classify a ticket through the model, recovering a valid analysis
    /// from whatever comes back. Never returns an error.
    pub async fn generate_structured(
        &self,
        text: &str,
        examples: &[RetrievedExample],
    ) -> TicketAnalysis {
        let start = Instant::now();
        let prompt = Self::build_prompt(text, examples);
        let model = self.model().await.to_string();

        match self
            .backend
            .chat(&model, SYSTEM_PROMPT, &prompt, self.options())
            .await
        {
            Ok(raw) => {
                info!(
                    "Model responded in {:.2}s ({} chars)",
                    start.elapsed().as_secs_f64(),
                    raw.len()
                );
                match extract::extract_json(&raw) {
                    Some(value) => extract::validate(&value, text),
                    None => {
                        warn!("No JSON object in model output, inferring from raw text");
                        extract::infer_from_output(&raw)
                    }
                }
            }
            Err(e) => {
                warn!("Model generation failed ({e}), using keyword fallback");
                client_fallback(text)
            }
        }
    }

    /// Lower-level unvalidated generation.
    pub async fn raw_generate(&self, prompt: &str, max_tokens: u32) -> Result<String, TriageError> {
        let model = self.model().await.to_string();
        self.backend.generate(&model, prompt, max_tokens).await
    }

    /// Detailed classification with secondary categories and a
    /// confidence score, over the raw-generation path.
    pub async fn classify_detailed(
        &self,
        text: &str,
        examples: &[RetrievedExample],
    ) -> DetailedClassification {
        let context: String = examples
            .iter()
            .map(|ex| format!("- {} => {}\n", ex.entry.instruction, ex.entry.response))
            .collect();
        let prompt = format!(
            "You are a helpdesk classifier.\n\
             Use the following examples as context:\n\
             {context}\n\
             Now analyze the new ticket and return JSON:\n\
             {{\n\
               \"primary\": \"CATEGORY\",\n\
               \"secondary\": [\"OTHER_CATEGORY\"],\n\
               \"confidence\": 0.5,\n\
               \"summary\": \"Short summary\",\n\
               \"response\": \"Customer-facing answer\"\n\
             }}\n\n\
             Ticket: \"{text}\"\n\
             Return only JSON.\n"
        );

        let fallback = || DetailedClassification {
            primary: Category::Other,
            secondary: Vec::new(),
            confidence: 0.0,
            summary: truncate_chars(text, 120),
            response: GENERIC_RESPONSE.to_string(),
        };

        match self.raw_generate(&prompt, 300).await {
            Ok(raw) => WHOLE_OBJECT
                .find(&raw)
                .and_then(|m| serde_json::from_str::<DetailedClassification>(m.as_str()).ok())
                .unwrap_or_else(fallback),
            Err(e) => {
                warn!("Detailed classification failed: {e}");
                fallback()
            }
        }
    }
}

//! Shared types: taxonomy, analysis records, knowledge entries, and the
//! Ollama wire schemas.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed ticket taxonomy. Case-insensitive on input, uppercase on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Account,
    Order,
    Billing,
    Technical,
    Subscription,
    Other,
}

impl Category {
    /// All categories, in taxonomy order.
    pub const ALL: [Category; 6] = [
        Category::Account,
        Category::Order,
        Category::Billing,
        Category::Technical,
        Category::Subscription,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Account => "ACCOUNT",
            Category::Order => "ORDER",
            Category::Billing => "BILLING",
            Category::Technical => "TECHNICAL",
            Category::Subscription => "SUBSCRIPTION",
            Category::Other => "OTHER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACCOUNT" => Ok(Category::Account),
            "ORDER" => Ok(Category::Order),
            "BILLING" => Ok(Category::Billing),
            "TECHNICAL" => Ok(Category::Technical),
            "SUBSCRIPTION" => Ok(Category::Subscription),
            "OTHER" => Ok(Category::Other),
            _ => Err(()),
        }
    }
}

/// Validated classification result - what `analyze` always returns.
///
/// Invariant: `category` is one of the six taxonomy values and
/// `summary`/`response` are never empty. Producers synthesize defaults
/// when the model output lacks them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketAnalysis {
    pub category: Category,
    #[serde(default = "default_subcategory")]
    pub subcategory: String,
    pub summary: String,
    pub response: String,
}

fn default_subcategory() -> String {
    "none".to_string()
}

/// Detailed classification (secondary categories + confidence), produced
/// by the lower-level raw-generation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedClassification {
    pub primary: Category,
    #[serde(default)]
    pub secondary: Vec<Category>,
    #[serde(default)]
    pub confidence: f64,
    pub summary: String,
    pub response: String,
}

/// One reference corpus entry. `response` is the label or canned answer
/// shown to the model as few-shot context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub instruction: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

/// A corpus entry scored against a query, highest cosine first.
#[derive(Debug, Clone)]
pub struct RetrievedExample {
    pub entry: KnowledgeEntry,
    pub score: f32,
}

// ---------------------------------------------------------------------------
// Ollama wire schemas
// ---------------------------------------------------------------------------

/// Ollama chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

/// Ollama message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
}

/// Sampling options forwarded to the model host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub num_predict: u32,
}

/// Ollama chat response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaChatResponse {
    pub model: String,
    pub message: OllamaMessage,
    pub done: bool,
    #[serde(default)]
    pub total_duration: Option<u64>,
}

/// Ollama plain generate request (unstructured path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaGenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

/// Ollama plain generate response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaGenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// Model info from /api/tags
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// Response from /api/tags
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<OllamaModel>,
}

/// Ollama embeddings request
#[derive(Debug, Clone, Serialize)]
pub struct OllamaEmbeddingsRequest {
    pub model: String,
    pub prompt: String,
}

/// Ollama embeddings response
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaEmbeddingsResponse {
    #[serde(default)]
    pub embedding: Vec<f32>,
}

//! Nearest-prototype category classification.
//!
//! One mean embedding per category, built from a small hand-curated
//! example set. Cheaper than k-NN over the full corpus; used by the
//! keyword-only classifier's middle tier.

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::OnceCell;

use crate::embedding::{cosine, Embedder};
use crate::error::TriageError;
use crate::schemas::Category;

/// Curated examples per category. OTHER has no prototype on purpose: it
/// is the absence of a signal, not a cluster.
const CATEGORY_EXAMPLES: [(Category, [&str; 4]); 5] = [
    (
        Category::Account,
        [
            "I forgot my password",
            "I can't log in",
            "My account was locked",
            "Change my email",
        ],
    ),
    (
        Category::Order,
        [
            "Where is my order?",
            "Tracking shows delivered but not received",
            "My package is missing",
            "Order delayed",
        ],
    ),
    (
        Category::Billing,
        [
            "I was charged twice",
            "Refund not received",
            "Payment declined",
            "Need invoice",
        ],
    ),
    (
        Category::Technical,
        [
            "App crashes",
            "Website not loading",
            "Login error",
            "Page freezing",
        ],
    ),
    (
        Category::Subscription,
        [
            "Cancel my subscription",
            "Renew my plan",
            "Upgrade to premium",
            "Subscription paused",
        ],
    ),
];

static LOWER_ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z\s]").expect("valid regex"));

/// Strip query text down to lowercase letters and spaces before
/// embedding, matching how the prototypes themselves are interpreted.
fn clean_for_prototype(text: &str) -> String {
    LOWER_ALPHA
        .replace_all(&text.to_lowercase(), "")
        .trim()
        .to_string()
}

/// Per-category mean-embedding prototypes, built at most once.
pub struct PrototypeIndex {
    prototypes: OnceCell<Vec<(Category, Vec<f32>)>>,
}

impl Default for PrototypeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PrototypeIndex {
    pub fn new() -> Self {
        Self {
            prototypes: OnceCell::new(),
        }
    }

    async fn prototypes(
        &self,
        embedder: &dyn Embedder,
    ) -> Result<&Vec<(Category, Vec<f32>)>, TriageError> {
        self.prototypes
            .get_or_try_init(|| async {
                let mut built = Vec::with_capacity(CATEGORY_EXAMPLES.len());
                for (category, examples) in CATEGORY_EXAMPLES {
                    let texts: Vec<String> = examples.iter().map(|s| s.to_string()).collect();
                    let vectors = embedder.embed(&texts).await?;
                    let dim = vectors
                        .first()
                        .map(|v| v.len())
                        .ok_or_else(|| TriageError::Embedding("no prototype vectors".into()))?;
                    let mut mean = vec![0.0f32; dim];
                    for vector in &vectors {
                        for (m, v) in mean.iter_mut().zip(vector.iter()) {
                            *m += v;
                        }
                    }
                    for m in &mut mean {
                        *m /= vectors.len() as f32;
                    }
                    built.push((category, mean));
                }
                Ok(built)
            })
            .await
    }

    /// Argmax cosine against the category prototypes. Returns the best
    /// category and its similarity score.
    pub async fn classify(
        &self,
        embedder: &dyn Embedder,
        text: &str,
    ) -> Result<(Category, f32), TriageError> {
        let prototypes = self.prototypes(embedder).await?;
        let cleaned = clean_for_prototype(text);
        let query = embedder.embed(std::slice::from_ref(&cleaned)).await?;
        let query = query
            .first()
            .ok_or_else(|| TriageError::Embedding("no query vector returned".into()))?;

        let mut best = (Category::Other, f32::MIN);
        for (category, prototype) in prototypes {
            let score = cosine(query, prototype);
            if score > best.1 {
                best = (*category, score);
            }
        }
        Ok(best)
    }
}

//! Pipeline orchestrator.
//!
//! One process-scoped service object owns the throttle, the knowledge
//! base, the prototype index, and the model backends; callers share it
//! across tasks. `analyze` is total: whatever fails inside, the caller
//! gets a structurally valid analysis, degraded to the keyword-only
//! path at worst.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::classifier::GenerativeClassifier;
use crate::config::TriageConfig;
use crate::embedding::{Embedder, OllamaEmbedder};
use crate::error::TriageError;
use crate::extract::{default_summary, GENERIC_RESPONSE};
use crate::knowledge::KnowledgeBase;
use crate::normalize::normalize;
use crate::ollama::{ChatBackend, OllamaBackend};
use crate::prototypes::PrototypeIndex;
use crate::rules;
use crate::schemas::{Category, TicketAnalysis};
use crate::throttle::CallThrottle;

pub struct TriagePipeline {
    config: TriageConfig,
    throttle: CallThrottle,
    knowledge: KnowledgeBase,
    prototypes: PrototypeIndex,
    classifier: GenerativeClassifier,
    embedder: Arc<dyn Embedder>,
}

impl TriagePipeline {
    /// Build the pipeline against a local Ollama host. Fails only on a
    /// broken corpus - connectivity problems degrade at call time.
    pub fn new(config: TriageConfig) -> Result<Self, TriageError> {
        let chat: Arc<dyn ChatBackend> = Arc::new(OllamaBackend::new(
            &config.ollama_url,
            Duration::from_secs(config.chat_timeout_secs),
        ));
        let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(
            &config.ollama_url,
            &config.embedding_model,
            Duration::from_secs(config.embed_timeout_secs),
        ));
        Self::with_backends(config, chat, embedder)
    }

    /// Build against explicit backends. This is the injection seam the
    /// tests use.
    pub fn with_backends(
        config: TriageConfig,
        chat: Arc<dyn ChatBackend>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, TriageError> {
        let knowledge = KnowledgeBase::load(&config)?;
        let throttle = CallThrottle::new(Duration::from_secs_f64(config.min_interval_secs));
        let classifier = GenerativeClassifier::new(chat, config.clone());
        Ok(Self {
            config,
            throttle,
            knowledge,
            prototypes: PrototypeIndex::new(),
            classifier,
            embedder,
        })
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Full analysis of one raw ticket. Never errors and never panics on
    /// input; any failure inside the sequence discards partial results
    /// and answers through the keyword-only path.
    pub async fn analyze(&self, raw_text: &str) -> TicketAnalysis {
        let start = Instant::now();
        let text = normalize(raw_text);

        let result = match self.run(&text).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Analysis failed ({e}), using keyword fallback");
                rules::keyword_fallback(&text)
            }
        };

        info!(
            category = %result.category,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ticket analyzed"
        );
        result
    }

    async fn run(&self, text: &str) -> Result<TicketAnalysis, TriageError> {
        self.throttle.acquire().await;

        let examples = self
            .knowledge
            .retrieve(self.embedder.as_ref(), text, self.config.retrieve_k)
            .await?;

        let analysis = self.classifier.generate_structured(text, &examples).await;
        let mut analysis = rules::correct(text, analysis);
        // The ensemble overwrites the category only
        analysis.category = rules::reconcile(text, analysis.category);
        Ok(Self::repair(text, analysis))
    }

    /// Final schema check: no field leaves the pipeline empty.
    fn repair(text: &str, mut analysis: TicketAnalysis) -> TicketAnalysis {
        if analysis.subcategory.trim().is_empty() {
            analysis.subcategory = "general".to_string();
        }
        if analysis.summary.trim().is_empty() {
            analysis.summary = default_summary(text);
        }
        if analysis.response.trim().is_empty() {
            analysis.response = GENERIC_RESPONSE.to_string();
        }
        analysis
    }

    /// Keyword-only classification, three tiers: exact rule match,
    /// prototype similarity, then the generative client as a last
    /// resort. No tier failure escapes this method.
    pub async fn classify(&self, raw_text: &str) -> (Category, f32) {
        let text = normalize(raw_text);

        if let Some(category) = rules::rule_category(&text) {
            return (category, 1.0);
        }

        match self.prototypes.classify(self.embedder.as_ref(), &text).await {
            Ok((category, confidence)) if confidence >= self.config.prototype_threshold => {
                return (category, confidence);
            }
            Ok(_) => {}
            Err(e) => warn!("Prototype tier unavailable ({e}), falling through"),
        }

        self.throttle.acquire().await;
        // Last resort: the detailed generative path. Context examples
        // need the embedding host, which may be the very thing that is
        // down here, so they are best-effort.
        let examples = self
            .knowledge
            .retrieve(self.embedder.as_ref(), &text, self.config.retrieve_k)
            .await
            .unwrap_or_default();
        let detailed = self.classifier.classify_detailed(&text, &examples).await;
        (detailed.primary, 0.5)
    }
}

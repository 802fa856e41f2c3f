//! Support-ticket triage pipeline.
//!
//! Classifies free-text tickets into a closed six-category taxonomy and
//! drafts a customer-facing reply, compensating for an unreliable local
//! generative model with retrieval context, rule-based correction,
//! ensemble reconciliation, and a fully offline keyword fallback.
//!
//! The entry point is [`TriagePipeline::analyze`], which always returns
//! a valid [`TicketAnalysis`], degraded rather than failing.

pub mod classifier;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod knowledge;
pub mod learn;
pub mod normalize;
pub mod ollama;
pub mod pipeline;
pub mod prototypes;
pub mod rules;
pub mod schemas;
pub mod sentiment;
pub mod throttle;

pub use config::TriageConfig;
pub use error::TriageError;
pub use normalize::normalize;
pub use pipeline::TriagePipeline;
pub use schemas::{Category, DetailedClassification, KnowledgeEntry, TicketAnalysis};
pub use sentiment::{detect_sentiment, Sentiment};

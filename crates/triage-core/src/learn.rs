//! Misclassification log for future fine-tuning.
//!
//! Append-only JSONL: one record per corrected ticket, with the
//! category the pipeline produced and the one a human assigned.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::error::TriageError;
use crate::schemas::Category;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MisclassifiedRecord {
    pub text: String,
    pub expected: Category,
    pub predicted: Category,
    pub recorded_at: chrono::DateTime<Utc>,
}

/// Append a misclassified ticket to the JSONL log at `path`.
pub fn log_misclassified(
    path: &Path,
    text: &str,
    expected: Category,
    predicted: Category,
) -> Result<(), TriageError> {
    let record = MisclassifiedRecord {
        text: text.to_string(),
        expected,
        predicted,
        recorded_at: Utc::now(),
    };
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(&record)?;
    writeln!(file, "{line}")?;
    Ok(())
}

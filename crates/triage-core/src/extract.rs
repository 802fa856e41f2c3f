//! Recovery of structured results from noisy model output.
//!
//! Model output is not guaranteed to be well-formed JSON, so parsing is
//! layered: regex-scan for brace-delimited candidates with trailing-comma
//! repair, then keyword inference over the raw text when nothing parses.
//! Each layer is a pure function from string to an optional value so the
//! layers are testable in isolation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::schemas::{Category, TicketAnalysis};

/// Brace-delimited candidates, one nesting level first, then flat.
static JSON_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"\{[^{}]*(\{[^{}]*\}[^{}]*)*\}").expect("valid regex"),
        Regex::new(r"\{[^}]+\}").expect("valid regex"),
    ]
});

static TRAILING_COMMA_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\}").expect("valid regex"));
static TRAILING_COMMA_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\]").expect("valid regex"));

/// Generic acknowledgement used when the model supplies no reply.
pub const GENERIC_RESPONSE: &str = "Thank you for your message. We'll assist you shortly.";

/// First N characters of a string, whole chars only.
pub fn truncate_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Scan `text` for the first brace-delimited substring that parses as a
/// JSON object containing a `category` key. Trailing commas before
/// closing braces/brackets are repaired before parsing.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for pattern in JSON_PATTERNS.iter() {
        for candidate in pattern.find_iter(text) {
            let repaired = TRAILING_COMMA_BRACE.replace_all(candidate.as_str(), "}");
            let repaired = TRAILING_COMMA_BRACKET.replace_all(&repaired, "]");
            if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
                if value.get("category").is_some() {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Last-resort reading of raw model output: guess a category from
/// keywords and fill the rest with generic fields.
pub fn infer_from_output(text: &str) -> TicketAnalysis {
    const TABLE: [(Category, &[&str]); 5] = [
        (Category::Account, &["account", "login", "password", "email"]),
        (Category::Order, &["order", "delivery", "shipping", "package"]),
        (Category::Billing, &["billing", "charge", "payment", "refund"]),
        (Category::Subscription, &["subscription", "cancel", "renew"]),
        (Category::Technical, &["technical", "crash", "error", "bug"]),
    ];
    let lower = text.to_lowercase();
    let category = TABLE
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| lower.contains(k)))
        .map(|(cat, _)| *cat)
        .unwrap_or(Category::Other);
    TicketAnalysis {
        category,
        subcategory: "general".to_string(),
        summary: format!("{}...", truncate_chars(text, 100)),
        response: GENERIC_RESPONSE.to_string(),
    }
}

/// Keyword inference over ticket text, used when the model's category is
/// missing or outside the taxonomy. Order matters: first match wins.
pub fn infer_category(text: &str) -> Category {
    let lower = text.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if any(&["login", "password", "account", "email"]) {
        Category::Account
    } else if any(&["order", "delivery", "shipping", "package"]) {
        Category::Order
    } else if any(&["charge", "payment", "bill", "refund"]) {
        Category::Billing
    } else if any(&["subscription", "cancel", "renew"]) {
        Category::Subscription
    } else if any(&["crash", "error", "technical", "slow"]) {
        Category::Technical
    } else {
        Category::Other
    }
}

/// Default summary synthesized from the ticket text.
pub fn default_summary(input: &str) -> String {
    format!("User reported: {}...", truncate_chars(input, 80))
}

/// Validate and repair an extracted JSON object into a full analysis.
///
/// The category is checked against the closed set; an invalid or missing
/// one is re-inferred from the *input* text, not the model output. The
/// remaining fields get synthetic defaults when absent or empty.
pub fn validate(value: &Value, input: &str) -> TicketAnalysis {
    let category = value
        .get("category")
        .and_then(|c| c.as_str())
        .and_then(|c| c.parse::<Category>().ok())
        .unwrap_or_else(|| infer_category(input));

    let subcategory = value
        .get("subcategory")
        .and_then(|s| s.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("general")
        .to_string();

    let summary = value
        .get("summary")
        .and_then(|s| s.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| default_summary(input));

    let response = value
        .get("response")
        .and_then(|r| r.as_str())
        .filter(|r| !r.trim().is_empty())
        .map(|r| r.to_string())
        .unwrap_or_else(|| GENERIC_RESPONSE.to_string());

    TicketAnalysis {
        category,
        subcategory,
        summary,
        response,
    }
}

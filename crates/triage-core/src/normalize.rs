//! Ticket text normalization.
//!
//! Canonicalizes raw ticket text before anything downstream sees it:
//! NFKC composition, ASCII quote variants, and a collapse of any
//! non-ASCII run to a single space. Idempotent and total.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_ASCII: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").expect("valid regex"));

/// Normalize raw ticket text. Empty input maps to the empty string.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let composed: String = text.nfkc().collect();
    let quoted = composed
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"");
    NON_ASCII.replace_all(&quoted, " ").trim().to_string()
}

//! Offline sentiment tagging for ticket text.
//!
//! Small word-list scorer: counts positive and negative cues over the
//! first 512 characters and reports NEUTRAL unless one side clearly
//! wins. Deterministic and dependency-free so it works on the degraded
//! path too.

use crate::extract::truncate_chars;

/// Characters of input considered; long rants carry no extra signal.
const WINDOW: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Neutral => "NEUTRAL",
        }
    }
}

const POSITIVE: &[&str] = &[
    "thanks", "thank", "great", "love", "perfect", "awesome", "excellent", "happy", "resolved",
    "appreciate", "good", "wonderful",
];

const NEGATIVE: &[&str] = &[
    "angry", "terrible", "awful", "worst", "hate", "furious", "unacceptable", "disappointed",
    "frustrated", "broken", "useless", "ridiculous", "scam", "never",
];

/// Detect the sentiment of ticket text. Empty or weak-signal input is
/// NEUTRAL.
pub fn detect_sentiment(text: &str) -> Sentiment {
    if text.trim().is_empty() {
        return Sentiment::Neutral;
    }
    let window = truncate_chars(text, WINDOW).to_lowercase();
    let mut positive = 0i32;
    let mut negative = 0i32;
    for word in window.split(|c: char| !c.is_alphanumeric()) {
        if POSITIVE.contains(&word) {
            positive += 1;
        } else if NEGATIVE.contains(&word) {
            negative += 1;
        }
    }
    // Require a clear margin, mirroring the upstream confidence cutoff
    if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_neutral() {
        assert_eq!(detect_sentiment(""), Sentiment::Neutral);
        assert_eq!(detect_sentiment("   "), Sentiment::Neutral);
    }

    #[test]
    fn test_negative_ticket() {
        assert_eq!(
            detect_sentiment("This is unacceptable, I am furious about the broken checkout"),
            Sentiment::Negative
        );
    }

    #[test]
    fn test_positive_ticket() {
        assert_eq!(
            detect_sentiment("Thanks, the issue is resolved and I appreciate the help"),
            Sentiment::Positive
        );
    }

    #[test]
    fn test_mixed_signal_is_neutral() {
        assert_eq!(
            detect_sentiment("Thanks but this is terrible"),
            Sentiment::Neutral
        );
    }

    #[test]
    fn test_plain_report_is_neutral() {
        assert_eq!(
            detect_sentiment("My order number 1234 has not arrived"),
            Sentiment::Neutral
        );
    }
}

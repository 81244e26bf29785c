//! Confidence extraction from model responses.
//!
//! Stages ask the model for a confidence score but cannot rely on getting
//! one. Responses without a parseable value score neutral (0.5) so a silent
//! omission never reads as certainty in either direction.

use regex::Regex;
use std::sync::OnceLock;

/// Score assigned when a response carries no parseable confidence.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

fn confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)confidence\s*(?:score)?\s*(?:is|:|=|of)?\s*([0-9]+(?:\.[0-9]+)?)\s*(%)?")
            .unwrap()
    })
}

/// Pulls a confidence score out of free-form model text.
///
/// Accepts `Confidence: 0.92`, `confidence score of 92%`, and similar
/// phrasings. Percentages and bare values above 1 are scaled down; the
/// result is always within `[0, 1]`.
pub fn parse_confidence(text: &str) -> f64 {
    let captures = match confidence_re().captures(text) {
        Some(c) => c,
        None => return DEFAULT_CONFIDENCE,
    };
    let value: f64 = match captures[1].parse() {
        Ok(v) => v,
        Err(_) => return DEFAULT_CONFIDENCE,
    };
    let scaled = if captures.get(2).is_some() || value > 1.0 {
        value / 100.0
    } else {
        value
    };
    if scaled.is_finite() {
        scaled.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    }
}

//! Substring-based quota detection
//!
//! Last-resort classifier for upstream failures that carry no structured
//! quota signal. Matches the lower-cased error text against a fixed set of
//! markers.

use crate::ErrorClassification;

/// Markers that indicate quota or rate-limit exhaustion.
pub const QUOTA_PATTERNS: &[&str] = &["quota", "rate_limit", "429", "resource_exhausted"];

/// Classify a raw error message as quota exhaustion or a transient failure.
pub fn classify_message(message: &str) -> ErrorClassification {
    let lower = message.to_lowercase();
    if QUOTA_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        ErrorClassification::QuotaExceeded
    } else {
        ErrorClassification::Transient
    }
}

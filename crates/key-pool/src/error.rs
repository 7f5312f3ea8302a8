//! Error types for the rotation and fallback core

use std::fmt;

use scripture::SecondaryFailure;
use serde::Serialize;

/// How a single primary attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    QuotaExceeded,
    Other,
}

/// One failed primary attempt, kept for the terminal error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    pub credential_id: String,
    pub kind: FailureKind,
    pub cause: String,
}

/// Every primary attempt made during one `generate` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryFailures(pub Vec<AttemptFailure>);

impl PrimaryFailures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn all_quota(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|f| f.kind == FailureKind::QuotaExceeded)
    }
}

impl fmt::Display for PrimaryFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no eligible credential");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            let kind = match failure.kind {
                FailureKind::QuotaExceeded => "quota exceeded",
                FailureKind::Other => "error",
            };
            write!(f, "key {} {kind}: {}", failure.credential_id, failure.cause)?;
        }
        Ok(())
    }
}

/// Errors that cross the core/caller boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential pool is empty")]
    EmptyPool,

    /// Every primary credential failed and the scripture fallback failed too.
    #[error("all sources exhausted: primary [{failures}]; scripture fallback: {secondary}")]
    AllSourcesExhausted {
        failures: PrimaryFailures,
        secondary: SecondaryFailure,
    },
}

impl Error {
    /// Explanation suitable for showing to an end user. Names the sources
    /// that were tried without exposing raw upstream error text.
    pub fn user_message(&self) -> String {
        match self {
            Error::EmptyPool => {
                "The study service has no generation credentials configured.".to_string()
            }
            Error::AllSourcesExhausted {
                failures,
                secondary,
            } => {
                let primary = if failures.is_empty() {
                    "the AI study generator (every key is cooling down)".to_string()
                } else if failures.all_quota() {
                    format!(
                        "the AI study generator ({} key(s), daily quota reached)",
                        failures.len()
                    )
                } else {
                    format!(
                        "the AI study generator ({} key(s), temporarily failing)",
                        failures.len()
                    )
                };
                let fallback = match secondary {
                    SecondaryFailure::NotConfigured => "scripture search (not configured)",
                    SecondaryFailure::NoSearchTerms => {
                        "scripture search (no searchable topic in the request)"
                    }
                    SecondaryFailure::QuotaExceeded(_) => "scripture search (quota reached)",
                    SecondaryFailure::Unavailable(_) => "scripture search (unreachable)",
                    SecondaryFailure::NoResults(_) => "scripture search (no matching passages)",
                };
                format!(
                    "Study content is temporarily unavailable. Sources tried: {primary}; {fallback}. \
                     Please try again in a few minutes."
                )
            }
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

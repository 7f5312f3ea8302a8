//! Outbound capability abstraction for the study gateway
//!
//! The rotation core never talks HTTP directly. It consumes two capabilities:
//! - `CompletionBackend`: one completion request authenticated by one credential
//! - `ScriptureSearch`: a scripture lookup used only as a fallback source
//!
//! Both return `ProviderError` on failure. `ProviderError::classify` decides
//! whether a failure is a quota signal (rotate and back off) or anything else.

pub mod classify;

pub use classify::{QUOTA_PATTERNS, classify_message};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Classification of an upstream failure for rotation decisions.
///
/// QuotaExceeded marks the credential failed and applies the quota backoff.
/// Transient rotates to the next credential immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    QuotaExceeded,
    Transient,
}

/// A located scripture passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScripturePassage {
    /// Human-readable reference, e.g. "John 3:16"
    pub reference: String,
    pub text: String,
}

/// Errors from a single upstream call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Classify this failure.
    ///
    /// Structured signals win: an HTTP 429 is always quota. Everything else
    /// falls back to substring matching on the rendered error text, which is
    /// the only signal some upstream failures carry.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            ProviderError::Status { status: 429, .. } => ErrorClassification::QuotaExceeded,
            ProviderError::Timeout(_) | ProviderError::NotConfigured(_) => {
                ErrorClassification::Transient
            }
            other => classify_message(&other.to_string()),
        }
    }
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Boxed future returned by capability traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// "LLM completion" capability: one request, one credential, no retries.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CompletionBackend>`).
pub trait CompletionBackend: Send + Sync {
    /// Identifier for logging (e.g. "gemini")
    fn id(&self) -> &str;

    /// Issue exactly one completion request authenticated with `credential`.
    fn complete<'a>(
        &'a self,
        credential: &'a str,
        prompt: &'a str,
        max_tokens: u32,
    ) -> BoxFuture<'a, Result<String>>;
}

/// "Scripture search" capability.
pub trait ScriptureSearch: Send + Sync {
    /// Identifier for logging and health reporting (e.g. "api.bible")
    fn id(&self) -> &str;

    /// Search for passages matching `query`, returning at most `limit` results.
    fn search<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ScripturePassage>>>;
}

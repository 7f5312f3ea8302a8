//! Secondary provider adapter used by the fallback chain

use std::sync::Arc;
use std::time::Duration;

use provider::{ErrorClassification, ProviderError, ScripturePassage, ScriptureSearch};
use tracing::{info, warn};

use crate::synthesis::synthesize;
use crate::terms::derive_search_terms;

/// Why the scripture fallback produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecondaryFailure {
    #[error("scripture search is not configured")]
    NotConfigured,

    #[error("no searchable terms in prompt")]
    NoSearchTerms,

    #[error("scripture search quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("scripture search failed: {0}")]
    Unavailable(String),

    #[error("scripture search returned no results for \"{0}\"")]
    NoResults(String),
}

/// Fallback content produced from scripture search.
#[derive(Debug, Clone)]
pub struct FallbackContent {
    pub query: String,
    pub passages: Vec<ScripturePassage>,
    pub text: String,
}

/// Wraps a `ScriptureSearch` capability with a result limit and timeout.
///
/// An adapter without a search backend is valid: every lookup fails with
/// `NotConfigured`, which lets the orchestrator report both sources as
/// exhausted instead of failing at startup.
#[derive(Clone)]
pub struct ScriptureAdapter {
    search: Option<Arc<dyn ScriptureSearch>>,
    limit: usize,
    timeout: Duration,
}

impl ScriptureAdapter {
    pub fn new(search: Arc<dyn ScriptureSearch>, limit: usize, timeout: Duration) -> Self {
        Self {
            search: Some(search),
            limit,
            timeout,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            search: None,
            limit: 0,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.search.is_some()
    }

    pub fn id(&self) -> &str {
        self.search.as_ref().map(|s| s.id()).unwrap_or("none")
    }

    /// Run one search bounded by the adapter timeout.
    pub async fn lookup(&self, query: &str) -> Result<Vec<ScripturePassage>, SecondaryFailure> {
        self.lookup_limited(query, self.limit).await
    }

    /// Lightweight reachability check: a single-result search.
    pub async fn probe(&self, query: &str) -> Result<(), SecondaryFailure> {
        self.lookup_limited(query, 1).await.map(|_| ())
    }

    async fn lookup_limited(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScripturePassage>, SecondaryFailure> {
        let search = self.search.as_ref().ok_or(SecondaryFailure::NotConfigured)?;

        let result = match tokio::time::timeout(self.timeout, search.search(query, limit)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };

        result.map_err(|e| match e.classify() {
            ErrorClassification::QuotaExceeded => SecondaryFailure::QuotaExceeded(e.to_string()),
            ErrorClassification::Transient => SecondaryFailure::Unavailable(e.to_string()),
        })
    }

    /// Format passages for `original_prompt`. See [`synthesize`].
    pub fn synthesize(&self, results: &[ScripturePassage], original_prompt: &str) -> String {
        synthesize(results, original_prompt)
    }

    /// Derive search terms from the prompt, look them up once, and synthesize.
    pub async fn fallback(&self, original_prompt: &str) -> Result<FallbackContent, SecondaryFailure> {
        if !self.is_configured() {
            return Err(SecondaryFailure::NotConfigured);
        }
        let query = derive_search_terms(original_prompt);
        if query.is_empty() {
            return Err(SecondaryFailure::NoSearchTerms);
        }

        let passages = match self.lookup(&query).await {
            Ok(p) if p.is_empty() => {
                warn!(query, "scripture fallback found no passages");
                return Err(SecondaryFailure::NoResults(query));
            }
            Ok(p) => p,
            Err(e) => {
                warn!(query, error = %e, "scripture fallback search failed");
                return Err(e);
            }
        };

        info!(query, passages = passages.len(), "scripture fallback assembled");
        let text = self.synthesize(&passages, original_prompt);
        Ok(FallbackContent {
            query,
            passages,
            text,
        })
    }
}

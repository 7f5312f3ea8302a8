//! Single-attempt completion executor
//!
//! Issues exactly one upstream request with one credential and classifies
//! the result. Retrying is the orchestrator's job.

use std::sync::Arc;
use std::time::Duration;

use provider::{CompletionBackend, ErrorClassification, ProviderError};
use tracing::{error, info, warn};

use crate::pool::{Credential, KeyPool};

/// Classified result of one primary attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(String),
    QuotaExceeded(String),
    OtherError(String),
}

impl CallOutcome {
    /// Map a raw provider result onto an outcome.
    pub fn classify(result: provider::Result<String>) -> Self {
        match result {
            Ok(text) => CallOutcome::Success(text),
            Err(e) => match e.classify() {
                ErrorClassification::QuotaExceeded => CallOutcome::QuotaExceeded(e.to_string()),
                ErrorClassification::Transient => CallOutcome::OtherError(e.to_string()),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::Success(_) => "success",
            CallOutcome::QuotaExceeded(_) => "quota_exceeded",
            CallOutcome::OtherError(_) => "error",
        }
    }
}

/// Runs attempts against a `CompletionBackend`, one credential at a time.
#[derive(Clone)]
pub struct CallExecutor {
    backend: Arc<dyn CompletionBackend>,
    pool: Arc<KeyPool>,
    attempt_timeout: Duration,
}

impl CallExecutor {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        pool: Arc<KeyPool>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            pool,
            attempt_timeout,
        }
    }

    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    /// One completion attempt. Success increments the credential's usage counter.
    pub async fn execute(&self, credential: &Credential, prompt: &str, max_tokens: u32) -> CallOutcome {
        let outcome = self.call(credential, prompt, max_tokens).await;
        let id = credential.id();

        match &outcome {
            CallOutcome::Success(text) => {
                self.pool.record_success(id).await;
                info!(credential_id = id, chars = text.len(), "primary call succeeded");
            }
            CallOutcome::QuotaExceeded(cause) => {
                warn!(credential_id = id, error = %cause, "primary call hit quota");
            }
            CallOutcome::OtherError(cause) => {
                error!(credential_id = id, error = %cause, "primary call failed");
            }
        }
        metrics::counter!("gateway_primary_attempts_total", "outcome" => outcome.label())
            .increment(1);

        outcome
    }

    /// Lightweight availability check. Not counted as usage and not logged
    /// as a request outcome.
    pub async fn probe(&self, credential: &Credential, prompt: &str, max_tokens: u32) -> CallOutcome {
        self.call(credential, prompt, max_tokens).await
    }

    async fn call(&self, credential: &Credential, prompt: &str, max_tokens: u32) -> CallOutcome {
        let request = self
            .backend
            .complete(credential.expose(), prompt, max_tokens);
        let result = match tokio::time::timeout(self.attempt_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.attempt_timeout)),
        };
        CallOutcome::classify(result)
    }
}

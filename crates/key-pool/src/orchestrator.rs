//! Fallback orchestrator: credential rotation, then scripture search
//!
//! One `generate` call makes at most `pool_size` primary attempts and at
//! most one secondary attempt. Single-credential failures are absorbed here;
//! only `Error::AllSourcesExhausted` reaches the caller.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use provider::CompletionBackend;
use scripture::ScriptureAdapter;
use tracing::{debug, error, info, warn};

use crate::error::{AttemptFailure, Error, FailureKind, PrimaryFailures, Result};
use crate::executor::{CallExecutor, CallOutcome};
use crate::pool::KeyPool;

/// Retry timing for the primary loop.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Pause after a quota failure before trying the next credential.
    pub quota_backoff: Duration,
    /// Upper bound for each individual upstream attempt.
    pub attempt_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            quota_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

/// Where the returned text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Generated with the credential of this identifier.
    Primary(String),
    SecondaryFallback,
}

impl Source {
    /// `primary:<id>` or `secondary_fallback`.
    pub fn label(&self) -> String {
        match self {
            Source::Primary(id) => format!("primary:{id}"),
            Source::SecondaryFallback => "secondary_fallback".to_string(),
        }
    }
}

/// Successful result of `generate`.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub source: Source,
    /// Primary attempts made, including the successful one.
    pub attempts: usize,
}

pub struct Orchestrator {
    pool: Arc<KeyPool>,
    executor: CallExecutor,
    secondary: ScriptureAdapter,
    quota_backoff: Duration,
    secondary_usage: AtomicU64,
}

impl Orchestrator {
    /// Wire the core together. An empty pool is a configuration error.
    pub fn new(
        pool: Arc<KeyPool>,
        backend: Arc<dyn CompletionBackend>,
        secondary: ScriptureAdapter,
        settings: OrchestratorSettings,
    ) -> Result<Self> {
        if pool.is_empty() {
            return Err(Error::EmptyPool);
        }
        let executor = CallExecutor::new(backend, pool.clone(), settings.attempt_timeout);
        Ok(Self {
            pool,
            executor,
            secondary,
            quota_backoff: settings.quota_backoff,
            secondary_usage: AtomicU64::new(0),
        })
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub fn executor(&self) -> &CallExecutor {
        &self.executor
    }

    pub fn secondary(&self) -> &ScriptureAdapter {
        &self.secondary
    }

    /// Successful scripture fallbacks since startup.
    pub fn secondary_usage(&self) -> u64 {
        self.secondary_usage.load(Ordering::Relaxed)
    }

    /// Generate with one attempt per credential in the pool.
    pub async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Generation> {
        self.generate_with_retries(prompt, max_tokens, self.pool.len())
            .await
    }

    /// Generate with at most `retries` primary attempts (capped at pool size).
    pub async fn generate_with_retries(
        &self,
        prompt: &str,
        max_tokens: u32,
        retries: usize,
    ) -> Result<Generation> {
        let retries = retries.min(self.pool.len());
        let mut failures = Vec::new();
        let mut tried = HashSet::new();

        for attempt in 0..retries {
            let Some(credential) = self.pool.next_credential().await else {
                debug!(attempt, "no eligible credential left");
                break;
            };
            let id = credential.id().to_string();
            // Rotation wrapped around past marked credentials.
            if !tried.insert(id.clone()) {
                debug!(attempt, credential_id = %id, "every eligible credential already tried");
                break;
            }

            match self.executor.execute(&credential, prompt, max_tokens).await {
                CallOutcome::Success(text) => {
                    metrics::counter!("gateway_generations_total", "source" => "primary")
                        .increment(1);
                    return Ok(Generation {
                        text,
                        source: Source::Primary(id),
                        attempts: attempt + 1,
                    });
                }
                CallOutcome::QuotaExceeded(cause) => {
                    self.pool.mark_failed(&id).await;
                    failures.push(AttemptFailure {
                        credential_id: id,
                        kind: FailureKind::QuotaExceeded,
                        cause,
                    });
                    if attempt + 1 < retries && !self.quota_backoff.is_zero() {
                        tokio::time::sleep(self.quota_backoff).await;
                    }
                }
                CallOutcome::OtherError(cause) => {
                    failures.push(AttemptFailure {
                        credential_id: id,
                        kind: FailureKind::Other,
                        cause,
                    });
                }
            }
        }

        let attempts = failures.len();
        warn!(
            attempts,
            secondary = self.secondary.id(),
            "primary credentials exhausted, trying scripture fallback"
        );

        match self.secondary.fallback(prompt).await {
            Ok(content) => {
                self.secondary_usage.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("gateway_generations_total", "source" => "secondary_fallback")
                    .increment(1);
                info!(query = %content.query, passages = content.passages.len(), "served scripture fallback");
                Ok(Generation {
                    text: content.text,
                    source: Source::SecondaryFallback,
                    attempts,
                })
            }
            Err(secondary) => {
                metrics::counter!("gateway_generations_total", "source" => "exhausted")
                    .increment(1);
                let err = Error::AllSourcesExhausted {
                    failures: PrimaryFailures(failures),
                    secondary,
                };
                error!(error = %err, "all sources exhausted");
                Err(err)
            }
        }
    }
}

//! Per-source health reporting
//!
//! Every credential is probed with a tiny generation request, concurrently,
//! and the scripture source with a one-result search. Probes never touch
//! usage counters or the failed set.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::executor::CallOutcome;
use crate::orchestrator::Orchestrator;
use crate::pool::Credential;

/// Quota usage (percent) at which a reachable source turns `Warning`.
pub const WARNING_THRESHOLD_PCT: f64 = 70.0;
/// Quota usage (percent) at which a reachable source turns `Critical`.
pub const CRITICAL_THRESHOLD_PCT: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn color(self) -> &'static str {
        match self {
            HealthStatus::Ok => "green",
            HealthStatus::Warning => "yellow",
            HealthStatus::Critical => "red",
        }
    }
}

/// Map availability and quota usage onto a status.
pub fn status_for(quota_used_percent: f64, available: bool) -> HealthStatus {
    if !available || quota_used_percent >= CRITICAL_THRESHOLD_PCT {
        HealthStatus::Critical
    } else if quota_used_percent >= WARNING_THRESHOLD_PCT {
        HealthStatus::Warning
    } else {
        HealthStatus::Ok
    }
}

/// Usage against an assumed daily limit, capped at 100 and rounded to 0.1.
/// A zero limit counts as fully used.
pub fn quota_used_percent(usage: u64, daily_limit: u64) -> f64 {
    if daily_limit == 0 {
        return 100.0;
    }
    let pct = (usage as f64 / daily_limit as f64 * 100.0).min(100.0);
    (pct * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub id: String,
    pub is_available: bool,
    pub quota_used_percent: f64,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: HealthStatus,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_hint: Option<String>,
    pub marked_failed: bool,
}

impl HealthSnapshot {
    fn new(id: String, is_available: bool, usage: u64, limit: u64, error: Option<String>) -> Self {
        let pct = quota_used_percent(usage, limit);
        let status = status_for(pct, is_available);
        Self {
            id,
            is_available,
            quota_used_percent: pct,
            usage_count: usage,
            error,
            status,
            color: status.color(),
            key_hint: None,
            marked_failed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub credentials: Vec<HealthSnapshot>,
    pub secondary: HealthSnapshot,
    pub current_index: usize,
    pub pool_size: usize,
    pub available_credentials: usize,
    pub assumed_daily_limit: u64,
}

/// Assumed limits and probe payloads.
#[derive(Debug, Clone)]
pub struct HealthLimits {
    pub credential_daily_limit: u64,
    pub secondary_daily_limit: u64,
    pub probe_prompt: String,
    pub probe_query: String,
}

impl Default for HealthLimits {
    fn default() -> Self {
        Self {
            credential_daily_limit: 1500,
            secondary_daily_limit: 5000,
            probe_prompt: "Reply with OK.".to_string(),
            probe_query: "love".to_string(),
        }
    }
}

pub struct HealthReporter {
    orchestrator: Arc<Orchestrator>,
    limits: HealthLimits,
}

impl HealthReporter {
    pub fn new(orchestrator: Arc<Orchestrator>, limits: HealthLimits) -> Self {
        Self {
            orchestrator,
            limits,
        }
    }

    pub fn limits(&self) -> &HealthLimits {
        &self.limits
    }

    /// Probe every source and assemble the report.
    pub async fn report(&self) -> HealthReport {
        let pool = self.orchestrator.pool();
        let snapshot = pool.snapshot().await;

        let probes = pool
            .credentials()
            .iter()
            .map(|credential| self.probe_credential(credential));
        let outcomes = join_all(probes).await;

        let credentials: Vec<HealthSnapshot> = snapshot
            .credentials
            .iter()
            .zip(outcomes)
            .map(|(state, outcome)| {
                let (available, error) = match outcome {
                    CallOutcome::Success(_) => (true, None),
                    CallOutcome::QuotaExceeded(e) | CallOutcome::OtherError(e) => (false, Some(e)),
                };
                let mut entry = HealthSnapshot::new(
                    state.id.clone(),
                    available,
                    state.usage_count,
                    self.limits.credential_daily_limit,
                    error,
                );
                entry.key_hint = Some(state.key_hint.clone());
                entry.marked_failed = state.marked_failed;
                entry
            })
            .collect();

        let secondary = self.probe_secondary().await;
        let available_credentials = credentials.iter().filter(|c| c.is_available).count();
        debug!(
            available_credentials,
            pool_size = snapshot.pool_size,
            secondary_available = secondary.is_available,
            "health report assembled"
        );

        HealthReport {
            credentials,
            secondary,
            current_index: snapshot.current_index,
            pool_size: snapshot.pool_size,
            available_credentials,
            assumed_daily_limit: self.limits.credential_daily_limit,
        }
    }

    async fn probe_credential(&self, credential: &Credential) -> CallOutcome {
        self.orchestrator
            .executor()
            .probe(credential, &self.limits.probe_prompt, 8)
            .await
    }

    async fn probe_secondary(&self) -> HealthSnapshot {
        let adapter = self.orchestrator.secondary();
        let error = adapter
            .probe(&self.limits.probe_query)
            .await
            .err()
            .map(|e| e.to_string());
        HealthSnapshot::new(
            adapter.id().to_string(),
            error.is_none(),
            self.orchestrator.secondary_usage(),
            self.limits.secondary_daily_limit,
            error,
        )
    }
}

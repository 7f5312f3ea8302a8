//! Credential pool, rotation pointer, and usage counters
//!
//! One `KeyPool` owns every piece of mutable rotation state behind a single
//! mutex: the round-robin pointer, the failed set, and the per-credential
//! success counters. The lock is only held for in-memory bookkeeping, never
//! across an upstream call.
//!
//! Failed marks expire: with a `failure_ttl` the mark lapses on the first
//! scan after its deadline, without `failure_ttl` it lasts until
//! `reset_failed`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One upstream credential. Immutable for the life of the process.
pub struct Credential {
    id: String,
    secret: Secret<String>,
}

impl Credential {
    /// Stable 1-based identifier ("1", "2", ...)
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expose(&self) -> &str {
        self.secret.expose()
    }

    /// Masked key suffix for operators.
    pub fn hint(&self) -> String {
        self.secret.hint()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Failed-set entry: `None` lasts until reset, `Some` until the instant passes.
type FailedMark = Option<Instant>;

struct RotationState {
    current_index: usize,
    failed: HashMap<usize, FailedMark>,
    usage: Vec<u64>,
}

/// Per-credential view for health and admin endpoints. Never carries the secret.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialState {
    pub id: String,
    pub key_hint: String,
    pub usage_count: u64,
    pub marked_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_remaining_secs: Option<u64>,
}

/// Point-in-time copy of the rotation state.
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub current_index: usize,
    pub pool_size: usize,
    pub credentials: Vec<CredentialState>,
}

/// Ordered pool of interchangeable credentials with round-robin selection.
pub struct KeyPool {
    credentials: Vec<Arc<Credential>>,
    state: Mutex<RotationState>,
    failure_ttl: Option<Duration>,
}

impl KeyPool {
    /// Build a pool from secrets in configuration order. Identifiers are
    /// assigned 1-based in that order.
    pub fn new(secrets: Vec<Secret<String>>, failure_ttl: Option<Duration>) -> Self {
        let credentials: Vec<Arc<Credential>> = secrets
            .into_iter()
            .enumerate()
            .map(|(i, secret)| {
                Arc::new(Credential {
                    id: (i + 1).to_string(),
                    secret,
                })
            })
            .collect();
        let n = credentials.len();
        info!(
            credentials = n,
            failure_ttl_secs = failure_ttl.map(|d| d.as_secs()),
            "key pool initialized"
        );
        Self {
            credentials,
            state: Mutex::new(RotationState {
                current_index: 0,
                failed: HashMap::new(),
                usage: vec![0; n],
            }),
            failure_ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credentials(&self) -> &[Arc<Credential>] {
        &self.credentials
    }

    fn slot_of(&self, id: &str) -> Option<usize> {
        self.credentials.iter().position(|c| c.id == id)
    }

    /// Select the next eligible credential.
    ///
    /// Scans at most `pool_size` slots starting at `current_index`, skipping
    /// credentials in the failed set (expired marks are dropped on the way).
    /// The pointer moves to the slot after the returned credential. Returns
    /// `None` if every credential is marked failed or the pool is empty.
    pub async fn next_credential(&self) -> Option<Arc<Credential>> {
        let n = self.credentials.len();
        if n == 0 {
            return None;
        }

        let mut state = self.state.lock().await;
        let now = Instant::now();
        let start = state.current_index;

        for offset in 0..n {
            let slot = (start + offset) % n;
            let mark = state.failed.get(&slot).copied();
            match mark {
                None => {}
                Some(Some(until)) if now >= until => {
                    info!(credential_id = %self.credentials[slot].id, "failure mark expired, credential eligible again");
                    state.failed.remove(&slot);
                }
                Some(_) => continue,
            }

            state.current_index = (slot + 1) % n;
            return Some(self.credentials[slot].clone());
        }

        debug!(credentials = n, "every credential is marked failed");
        None
    }

    /// Add a credential to the failed set until reset or TTL expiry.
    pub async fn mark_failed(&self, id: &str) {
        let Some(slot) = self.slot_of(id) else {
            warn!(credential_id = id, "mark_failed for unknown credential ignored");
            return;
        };
        let until = self.failure_ttl.map(|ttl| Instant::now() + ttl);
        self.state.lock().await.failed.insert(slot, until);
        info!(
            credential_id = id,
            expires_in_secs = self.failure_ttl.map(|d| d.as_secs()),
            "credential marked failed"
        );
    }

    /// Clear the failed set. Returns how many marks were removed.
    pub async fn reset_failed(&self) -> usize {
        let mut state = self.state.lock().await;
        let cleared = state.failed.len();
        state.failed.clear();
        if cleared > 0 {
            info!(cleared, "failed credentials reset");
        }
        cleared
    }

    /// Count one successful call against `id`.
    pub async fn record_success(&self, id: &str) {
        if let Some(slot) = self.slot_of(id) {
            self.state.lock().await.usage[slot] += 1;
        }
    }

    /// Successful calls recorded for `id` since startup.
    pub async fn usage(&self, id: &str) -> u64 {
        match self.slot_of(id) {
            Some(slot) => self.state.lock().await.usage[slot],
            None => 0,
        }
    }

    /// Copy of the rotation state for reporting.
    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;
        let now = Instant::now();

        let credentials = self
            .credentials
            .iter()
            .enumerate()
            .map(|(slot, credential)| {
                let (marked_failed, failed_remaining_secs) = match state.failed.get(&slot) {
                    None => (false, None),
                    Some(None) => (true, None),
                    Some(Some(until)) if now >= *until => (false, None),
                    Some(Some(until)) => (true, Some((*until - now).as_secs())),
                };
                CredentialState {
                    id: credential.id.clone(),
                    key_hint: credential.hint(),
                    usage_count: state.usage[slot],
                    marked_failed,
                    failed_remaining_secs,
                }
            })
            .collect();

        PoolSnapshot {
            current_index: state.current_index,
            pool_size: self.credentials.len(),
            credentials,
        }
    }
}

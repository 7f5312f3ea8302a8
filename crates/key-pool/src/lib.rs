//! Credential rotation and fallback core for the study gateway
//!
//! Holds an ordered pool of interchangeable primary credentials, rotates
//! through them round-robin, and falls back to scripture search once every
//! credential has failed for a request.
//!
//! Request lifecycle:
//! 1. `Orchestrator::generate` asks the pool for the next eligible credential
//! 2. `CallExecutor` performs the call and classifies the outcome
//! 3. Quota failures put the credential in the failed set (until TTL or reset)
//! 4. After `pool_size` attempts the scripture adapter is tried exactly once
//! 5. If that fails too, `Error::AllSourcesExhausted` carries every cause

pub mod error;
pub mod executor;
pub mod health;
pub mod orchestrator;
pub mod pool;
pub mod reset;

#[cfg(test)]
mod test_support;

pub use error::{AttemptFailure, Error, FailureKind, PrimaryFailures, Result};
pub use executor::{CallExecutor, CallOutcome};
pub use health::{HealthLimits, HealthReport, HealthReporter, HealthSnapshot, HealthStatus};
pub use orchestrator::{Generation, Orchestrator, OrchestratorSettings, Source};
pub use pool::{Credential, CredentialState, KeyPool, PoolSnapshot};
pub use reset::spawn_reset_task;

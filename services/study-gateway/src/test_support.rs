//! In-process fakes for router tests

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use key_pool::{KeyPool, Orchestrator, OrchestratorSettings};
use provider::{BoxFuture, CompletionBackend, ProviderError, ScripturePassage, ScriptureSearch};
use scripture::ScriptureAdapter;

/// Succeeds for every key except those listed as quota-exhausted.
pub struct FakeBackend {
    quota_keys: Vec<String>,
}

impl CompletionBackend for FakeBackend {
    fn id(&self) -> &str {
        "fake-gemini"
    }

    fn complete<'a>(
        &'a self,
        credential: &'a str,
        prompt: &'a str,
        _max_tokens: u32,
    ) -> BoxFuture<'a, provider::Result<String>> {
        let exhausted = self.quota_keys.iter().any(|k| k == credential);
        Box::pin(async move {
            if exhausted {
                Err(ProviderError::Status {
                    status: 429,
                    message: "RESOURCE_EXHAUSTED: Quota exceeded".into(),
                })
            } else {
                Ok(format!("Study on {prompt}"))
            }
        })
    }
}

pub struct FakeSearch {
    quota: bool,
}

impl ScriptureSearch for FakeSearch {
    fn id(&self) -> &str {
        "fake-bible"
    }

    fn search<'a>(
        &'a self,
        _query: &'a str,
        _limit: usize,
    ) -> BoxFuture<'a, provider::Result<Vec<ScripturePassage>>> {
        let quota = self.quota;
        Box::pin(async move {
            if quota {
                return Err(ProviderError::Status {
                    status: 429,
                    message: "Too Many Requests".into(),
                });
            }
            Ok(vec![ScripturePassage {
                reference: "Psalm 23:1".into(),
                text: "The LORD is my shepherd; I shall not want.".into(),
            }])
        })
    }
}

pub enum Secondary {
    Healthy,
    Quota,
    Missing,
}

/// Orchestrator over `keys`, where `quota_keys` always answer 429.
pub fn orchestrator(keys: &[&str], quota_keys: &[&str], secondary: Secondary) -> Arc<Orchestrator> {
    let pool = Arc::new(KeyPool::new(
        keys.iter().map(|k| Secret::new(k.to_string())).collect(),
        None,
    ));
    let backend = Arc::new(FakeBackend {
        quota_keys: quota_keys.iter().map(|k| k.to_string()).collect(),
    });
    let adapter = match secondary {
        Secondary::Healthy => {
            ScriptureAdapter::new(Arc::new(FakeSearch { quota: false }), 5, Duration::from_secs(5))
        }
        Secondary::Quota => {
            ScriptureAdapter::new(Arc::new(FakeSearch { quota: true }), 5, Duration::from_secs(5))
        }
        Secondary::Missing => ScriptureAdapter::unconfigured(),
    };
    let settings = OrchestratorSettings {
        quota_backoff: Duration::ZERO,
        attempt_timeout: Duration::from_secs(5),
    };
    Arc::new(Orchestrator::new(pool, backend, adapter, settings).unwrap())
}

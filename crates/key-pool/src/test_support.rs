//! Scripted capability fakes shared by the core's unit tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::Secret;
use provider::{BoxFuture, CompletionBackend, ProviderError, ScripturePassage, ScriptureSearch};

use crate::pool::KeyPool;

/// Pool whose secrets are "key-1".."key-n".
pub fn test_pool(n: usize) -> Arc<KeyPool> {
    let secrets = (1..=n).map(|i| Secret::new(format!("key-{i}"))).collect();
    Arc::new(KeyPool::new(secrets, None))
}

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    /// HTTP 429 RESOURCE_EXHAUSTED
    Quota,
    /// Quota signalled only through the error text
    QuotaText,
    /// HTTP 500
    Fail,
    /// Never answers
    Hang,
}

/// Completion backend that answers per credential: `key-i` uses `behaviors[i-1]`.
pub struct ScriptedBackend {
    behaviors: Vec<Behavior>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(behaviors: &[Behavior]) -> Arc<Self> {
        Arc::new(Self {
            behaviors: behaviors.to_vec(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Credentials used, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn behavior_for(&self, credential: &str) -> Behavior {
        credential
            .strip_prefix("key-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| self.behaviors.get(n - 1).copied())
            .unwrap_or(Behavior::Fail)
    }
}

impl CompletionBackend for ScriptedBackend {
    fn id(&self) -> &str {
        "scripted"
    }

    fn complete<'a>(
        &'a self,
        credential: &'a str,
        prompt: &'a str,
        _max_tokens: u32,
    ) -> BoxFuture<'a, provider::Result<String>> {
        self.calls.lock().unwrap().push(credential.to_string());
        let behavior = self.behavior_for(credential);
        Box::pin(async move {
            match behavior {
                Behavior::Succeed => Ok(format!("{credential} answered: {prompt}")),
                Behavior::Quota => Err(ProviderError::Status {
                    status: 429,
                    message: "RESOURCE_EXHAUSTED: quota exceeded".into(),
                }),
                Behavior::QuotaText => Err(ProviderError::Transport(
                    "upstream closed stream: resource_exhausted".into(),
                )),
                Behavior::Fail => Err(ProviderError::Status {
                    status: 500,
                    message: "INTERNAL: backend error".into(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProviderError::Transport("unreachable".into()))
                }
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SearchBehavior {
    /// Return this many passages
    Results(usize),
    Quota,
    Fail,
}

/// Scripture search fake that counts calls.
pub struct ScriptedSearch {
    behavior: SearchBehavior,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new(behavior: SearchBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

const PASSAGES: &[(&str, &str)] = &[
    ("Psalm 46:1", "God is our refuge and strength, a very present help in trouble."),
    ("Isaiah 41:10", "Fear thou not; for I am with thee."),
    ("Matthew 11:28", "Come unto me, all ye that labour and are heavy laden."),
    ("Philippians 4:6", "Be careful for nothing."),
];

impl ScriptureSearch for ScriptedSearch {
    fn id(&self) -> &str {
        "scripted-bible"
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, provider::Result<Vec<ScripturePassage>>> {
        self.queries.lock().unwrap().push(query.to_string());
        let behavior = self.behavior;
        Box::pin(async move {
            match behavior {
                SearchBehavior::Results(n) => Ok(PASSAGES
                    .iter()
                    .take(n.min(limit))
                    .map(|(reference, text)| ScripturePassage {
                        reference: reference.to_string(),
                        text: text.to_string(),
                    })
                    .collect()),
                SearchBehavior::Quota => Err(ProviderError::Status {
                    status: 429,
                    message: "Too Many Requests".into(),
                }),
                SearchBehavior::Fail => Err(ProviderError::Transport("connection refused".into())),
            }
        })
    }
}

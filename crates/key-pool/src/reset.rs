//! Periodic clearing of the failed set

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::pool::KeyPool;

/// Spawn a task that calls `reset_failed` every `interval`.
///
/// The first tick is skipped so a freshly started pool is not reset at once.
pub fn spawn_reset_task(pool: Arc<KeyPool>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let cleared = pool.reset_failed().await;
            info!(cleared, "scheduled failed-credential reset");
        }
    })
}

//! Background refresh and backup loops.

use std::sync::Arc;
use std::time::Duration;

use cdd_dictionary::MetadataCache;

/// Long-running background task: refresh the dictionary every `interval`.
///
/// The first tick fires immediately and doubles as the startup fetch; if the
/// source is down at boot the cache walks its backup recovery path and the
/// loop keeps retrying on later ticks.
pub async fn refresh_loop(cache: Arc<MetadataCache>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // A scheduled tick has no caller to report to; the cache has
        // already counted and logged the failure.
        let _ = cache.refresh(false).await;
    }
}

/// Long-running background task: write the served dictionary to the backup
/// region every `interval`.
///
/// The immediate first tick is consumed up front so a freshly started
/// process does not overwrite the backup before its first successful
/// refresh.
pub async fn backup_loop(cache: Arc<MetadataCache>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        cache.backup();
    }
}

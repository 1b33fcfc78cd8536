//! Rule table hot-reload.
//!
//! A background task polls the rule file's modification time and length and
//! reloads the engine when either changes. While the engine is unavailable
//! and the file exists, every poll retries, so a table read half-written
//! recovers even if the finished write kept the same timestamp. Reloads run
//! on the blocking pool because parsing reads the file synchronously; the
//! game loop keeps selecting from the old snapshot until the new one is
//! swapped in.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use wavespawn_core::{FileSource, RuleEngine};

/// Modification time and length of `path`, `None` if it cannot be read
/// (e.g. deleted).
fn file_stamp(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// Spawn the watcher task. Abort the returned handle to stop it.
pub fn spawn_rule_watcher(
    engine: Arc<RuleEngine>,
    path: PathBuf,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_seen = file_stamp(&path);
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            path = %path.display(),
            poll_ms = u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX),
            "Rule hot-reload watcher started"
        );

        loop {
            interval.tick().await;
            let current = file_stamp(&path);
            let changed = current != last_seen;
            let retry = current.is_some() && !engine.is_available();
            if !changed && !retry {
                continue;
            }
            last_seen = current;
            if changed {
                info!(path = %path.display(), "Rule table changed, reloading");
            } else {
                debug!(path = %path.display(), "Rules unavailable, retrying load");
            }

            let engine = Arc::clone(&engine);
            let source = FileSource::new(path.clone());
            // The engine logs the outcome of the reload itself.
            if let Err(e) = tokio::task::spawn_blocking(move || engine.reload(&source)).await {
                warn!(error = %e, "Rule reload task failed");
            }
        }
    })
}

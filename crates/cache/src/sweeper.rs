//! Background session sweep.

use crate::traits::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Spawn the task that periodically reaps expired sessions.
///
/// The first tick fires immediately. The task exits once `shutdown` carries
/// `true` or its sender is dropped.
pub fn spawn_sweeper(
    cache: Arc<dyn SessionStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match cache.sweep().await {
                        Ok(stats) if stats.removed > 0 || stats.skipped > 0 => {
                            tracing::info!(
                                scanned = stats.scanned,
                                removed = stats.removed,
                                raced = stats.raced,
                                skipped = stats.skipped,
                                "Session sweep finished"
                            );
                        }
                        Ok(stats) => {
                            tracing::debug!(scanned = stats.scanned, "Session sweep found nothing to remove");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Session sweep failed");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Session sweeper stopping");
                        break;
                    }
                }
            }
        }
    })
}

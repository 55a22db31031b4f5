//! Periodic cache eviction task
//!
//! The sweeper is an owned task with explicit start/stop semantics: it runs
//! [`ArtifactCache::sweep_all`] on a fixed period until stopped or dropped.
//! Each pass works in bounded batches but drains the whole directory.

use super::ArtifactCache;
use crate::types::Event;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to a running sweep task
///
/// Dropping the handle stops the task; [`stop`](Self::stop) additionally waits
/// for it to exit.
pub struct CacheSweeper {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Spawn a sweep task
    ///
    /// The first sweep happens one `interval` after start, not immediately.
    ///
    /// # Parameters
    /// - `cache`: The cache to sweep
    /// - `interval`: Time between sweeps
    /// - `ttl`: Entries older than this are evicted
    /// - `event_tx`: Optional channel receiving a `CacheSwept` event per pass
    pub fn start(
        cache: Arc<ArtifactCache>,
        interval: Duration,
        ttl: Duration,
        event_tx: Option<broadcast::Sender<Event>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            info!(
                dir = ?cache.dir(),
                interval_secs = interval.as_secs(),
                ttl_secs = ttl.as_secs(),
                "cache sweeper started"
            );

            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = cache.sweep_all(SystemTime::now(), ttl).await;
                        debug!(
                            examined = report.examined,
                            evicted = report.evicted,
                            failed = report.failed,
                            "cache sweep finished"
                        );
                        if let Some(tx) = &event_tx {
                            tx.send(Event::CacheSwept {
                                examined: report.examined,
                                evicted: report.evicted,
                            })
                            .ok();
                        }
                    }
                }
            }

            info!("cache sweeper stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Whether the task is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to exit
    ///
    /// A sweep already in progress finishes first.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

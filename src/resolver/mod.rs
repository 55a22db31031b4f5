//! Resolution orchestrator
//!
//! [`Resolver::resolve`] normalizes the raw identifier, walks the configured
//! source list strictly in order, and stops at the first source that yields an
//! accepted artifact. Every other outcome is a soft failure: it is logged,
//! counted and broadcast as an [`Event::SourceFailed`], and the loop moves on.
//! When all sources soft-fail the recovery probe runs exactly once. Only when
//! that also comes up empty does the caller see [`Error::NotFound`].
//!
//! Sources are attempted sequentially, so worst-case latency is the sum of the
//! per-source deadlines. Dropping the future returned by `resolve` (for example
//! when an HTTP client disconnects) cancels the attempt in flight.

use crate::cache::{ArtifactCache, CacheSweeper};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{AttemptExecutor, Fetcher, HttpFetcher};
use crate::identifier::Identifier;
use crate::source::SourceDescriptor;
use crate::types::{
    ArtifactLocation, Event, FetchOutcome, Resolution, ResolvedArtifact, SoftFailureKind,
    SourceRef, StatsSnapshot,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod recovery;

pub use recovery::RecoveryProbe;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Lookup counters
#[derive(Debug, Default)]
struct ResolverStats {
    lookups: AtomicU64,
    invalid_identifiers: AtomicU64,
    resolved: AtomicU64,
    recovered: AtomicU64,
    not_found: AtomicU64,
    soft_failures: AtomicU64,
    timeouts: AtomicU64,
    cache_write_failures: AtomicU64,
}

impl ResolverStats {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            invalid_identifiers: self.invalid_identifiers.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            soft_failures: self.soft_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Resolves identifiers to image artifacts (cloneable - all state is shared)
#[derive(Clone)]
pub struct Resolver {
    config: Arc<Config>,
    executor: AttemptExecutor,
    recovery: Option<RecoveryProbe>,
    cache: Arc<ArtifactCache>,
    event_tx: broadcast::Sender<Event>,
    stats: Arc<ResolverStats>,
    lookup_limit: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl Resolver {
    /// Create a resolver that fetches over HTTP
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client cannot
    /// be created
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a resolver with a custom fetch capability
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;

        let recovery = config.recovery.as_ref().map(RecoveryProbe::new).transpose()?;
        let cache = Arc::new(ArtifactCache::new(
            config.cache.dir.clone(),
            config.cache.prefix.clone(),
            config.cache.sweep_batch_limit,
        ));
        let executor = AttemptExecutor::new(fetcher, config.fetch.clone());
        let lookup_limit = Arc::new(Semaphore::new(config.fetch.max_concurrent_lookups));
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            sources = config.sources.len(),
            recovery = recovery.is_some(),
            cache_dir = ?config.cache.dir,
            "resolver initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            executor,
            recovery,
            cache,
            event_tx,
            stats: Arc::new(ResolverStats::default()),
            lookup_limit,
            shutdown: CancellationToken::new(),
        })
    }

    /// Resolve a raw identifier
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIdentifier`] when normalization fails; no network
    ///   request is made
    /// - [`Error::NotFound`] when every source and the recovery probe fail
    /// - [`Error::ShuttingDown`] when [`shutdown`](Self::shutdown) was called
    ///   before or during the lookup
    pub async fn resolve(&self, raw: &str) -> Result<Resolution> {
        ResolverStats::incr(&self.stats.lookups);

        let identifier = match Identifier::normalize(raw) {
            Ok(identifier) => identifier,
            Err(e) => {
                ResolverStats::incr(&self.stats.invalid_identifiers);
                debug!(error = %e, "rejected identifier");
                return Err(e);
            }
        };

        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let _permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(Error::ShuttingDown),
            permit = self.lookup_limit.acquire() => permit.map_err(|_| Error::ShuttingDown)?,
        };

        self.event_tx
            .send(Event::LookupStarted {
                identifier: identifier.clone(),
            })
            .ok();

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!(identifier = %identifier, "lookup cancelled by shutdown");
                Err(Error::ShuttingDown)
            }
            result = self.run_pipeline(&identifier) => result,
        }
    }

    async fn run_pipeline(&self, identifier: &Identifier) -> Result<Resolution> {
        for (index, source) in self.config.sources.iter().enumerate() {
            let timeout = source
                .timeout
                .unwrap_or_else(|| self.executor.default_timeout());

            match self.executor.attempt(source, identifier, timeout).await {
                FetchOutcome::Success {
                    bytes,
                    content_type,
                } => {
                    let name = source.label();
                    info!(
                        identifier = %identifier,
                        source_index = index,
                        source = %name,
                        size = bytes.len(),
                        content_type = %content_type,
                        "source produced artifact"
                    );
                    let artifact = ResolvedArtifact {
                        bytes,
                        content_type,
                    };
                    return Ok(self
                        .store(identifier, SourceRef::Source { index, name }, artifact)
                        .await);
                }
                failure => self.record_soft_failure(identifier, index, source, &failure),
            }
        }

        if let Some(recovery) = &self.recovery
            && let Some(url) = recovery
                .probe(&self.executor, identifier, self.executor.default_timeout())
                .await
        {
            ResolverStats::incr(&self.stats.recovered);
            info!(identifier = %identifier, url = %url, "recovery probe found reference");
            self.event_tx
                .send(Event::Resolved {
                    identifier: identifier.clone(),
                    source: SourceRef::Recovery,
                    cache_key: None,
                })
                .ok();
            return Ok(Resolution {
                identifier: identifier.clone(),
                source: SourceRef::Recovery,
                artifact: ArtifactLocation::Reference(url),
            });
        }

        ResolverStats::incr(&self.stats.not_found);
        info!(identifier = %identifier, "no artifact found");
        self.event_tx
            .send(Event::NotFound {
                identifier: identifier.clone(),
            })
            .ok();
        Err(Error::NotFound(identifier.to_string()))
    }

    /// Persist fetched bytes, degrading to an in-memory artifact when the cache
    /// is disabled or refuses the write
    async fn store(
        &self,
        identifier: &Identifier,
        source: SourceRef,
        artifact: ResolvedArtifact,
    ) -> Resolution {
        ResolverStats::incr(&self.stats.resolved);

        let location = if !self.config.cache.enabled {
            ArtifactLocation::InMemory(artifact)
        } else {
            match self.cache.put(identifier, &artifact).await {
                Ok(entry) => ArtifactLocation::Cached(entry),
                Err(e) => {
                    ResolverStats::incr(&self.stats.cache_write_failures);
                    warn!(
                        identifier = %identifier,
                        error = %e,
                        "cache write failed, returning artifact in memory"
                    );
                    self.event_tx
                        .send(Event::CacheWriteFailed {
                            identifier: identifier.clone(),
                            error: e.to_string(),
                        })
                        .ok();
                    ArtifactLocation::InMemory(artifact)
                }
            }
        };

        let cache_key = match &location {
            ArtifactLocation::Cached(entry) => Some(entry.key.clone()),
            _ => None,
        };
        self.event_tx
            .send(Event::Resolved {
                identifier: identifier.clone(),
                source: source.clone(),
                cache_key,
            })
            .ok();

        Resolution {
            identifier: identifier.clone(),
            source,
            artifact: location,
        }
    }

    fn record_soft_failure(
        &self,
        identifier: &Identifier,
        index: usize,
        source: &SourceDescriptor,
        outcome: &FetchOutcome,
    ) {
        let Some(kind) = outcome.failure_kind() else {
            return;
        };
        let reason = outcome.failure_reason().unwrap_or_default();

        ResolverStats::incr(&self.stats.soft_failures);
        if kind == SoftFailureKind::TimedOut {
            ResolverStats::incr(&self.stats.timeouts);
        }

        let name = source.label();
        warn!(
            identifier = %identifier,
            source_index = index,
            source = %name,
            ?kind,
            reason = %reason,
            "source failed, trying next"
        );
        self.event_tx
            .send(Event::SourceFailed {
                identifier: identifier.clone(),
                index,
                source: name,
                kind,
                reason,
            })
            .ok();
    }

    /// Subscribe to resolver events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current counter values
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The artifact cache backing this resolver
    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// The configuration this resolver was built with
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Start the periodic cache sweep using the configured interval and TTL
    pub fn start_cache_sweeper(&self) -> CacheSweeper {
        CacheSweeper::start(
            self.cache.clone(),
            self.config.cache.sweep_interval,
            self.config.cache.ttl,
            Some(self.event_tx.clone()),
        )
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Refuse new lookups and cancel the ones in flight
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("resolver shutting down");
        self.shutdown.cancel();
        self.event_tx.send(Event::Shutdown).ok();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

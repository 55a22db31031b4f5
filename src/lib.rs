//! # avatar-resolver
//!
//! Resolve an identifier (a phone-number-like string) to an image by probing
//! an ordered list of configured sources.
//!
//! ## Design Philosophy
//!
//! - **Sources are configuration** - No endpoint is baked into the library
//! - **Soft failures fall through** - A source that rejects, errors or times out
//!   is logged and skipped; only total exhaustion is an error
//! - **Bounded latency** - Every attempt has its own deadline and abandoned
//!   lookups cancel their in-flight request
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use avatar_resolver::{ArtifactLocation, Config, Resolver, SourceDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         sources: vec![
//!             SourceDescriptor::new("https://img.example.com/avatar/{id}").with_name("primary"),
//!             SourceDescriptor::new("https://mirror.example.net/{id}.jpg"),
//!         ],
//!         ..Default::default()
//!     };
//!
//!     let resolver = Resolver::new(config)?;
//!     let _sweeper = resolver.start_cache_sweeper();
//!
//!     let resolution = resolver.resolve("+1 (555) 123-4567").await?;
//!     match resolution.artifact {
//!         ArtifactLocation::Cached(entry) => println!("stored as {}", entry.key),
//!         ArtifactLocation::InMemory(artifact) => println!("{} bytes", artifact.bytes.len()),
//!         ArtifactLocation::Reference(url) => println!("hosted at {}", url),
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Artifact cache and periodic sweep
pub mod cache;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Fetch attempts with per-attempt deadlines
pub mod fetch;
/// Identifier normalization
pub mod identifier;
/// Resolution orchestrator and recovery probe
pub mod resolver;
/// Source descriptors and URL templates
pub mod source;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use cache::{ArtifactCache, CacheEntry, CacheSweeper, CachedArtifact, SweepReport};
pub use config::{ApiConfig, CacheConfig, Config, FetchConfig, RecoveryConfig};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use fetch::{AttemptExecutor, FetchRequest, Fetcher, HttpFetcher};
pub use identifier::Identifier;
pub use resolver::{RecoveryProbe, Resolver};
pub use source::SourceDescriptor;
pub use types::{
    ArtifactLocation, Event, FetchOutcome, Resolution, ResolvedArtifact, SoftFailureKind,
    SourceRef, StatsSnapshot,
};

/// Wait for a termination signal, then shut the resolver down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Suitable as the shutdown future of [`api::start_api_server`].
pub async fn shutdown_on_signal(resolver: std::sync::Arc<Resolver>) {
    wait_for_signal().await;
    resolver.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    }
}

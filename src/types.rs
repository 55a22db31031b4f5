//! Core types for avatar-resolver

use crate::cache::CacheEntry;
use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of a single fetch attempt against one source
///
/// Created per attempt and consumed immediately by the resolver; only `Success`
/// stops the fallback loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The source answered with an accepted content type and a body
    Success {
        /// Response body
        bytes: Vec<u8>,
        /// Declared content type
        content_type: String,
    },
    /// The source answered, but not with something usable
    Rejected {
        /// Why the response was not accepted
        reason: String,
    },
    /// The attempt exceeded its deadline and was cancelled
    TimedOut,
    /// Connection, DNS, or non-2xx failure
    NetworkError {
        /// Description of the failure
        reason: String,
    },
}

impl FetchOutcome {
    /// Whether this outcome stops the fallback loop
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// Classification of a soft failure, `None` for `Success`
    pub fn failure_kind(&self) -> Option<SoftFailureKind> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Rejected { .. } => Some(SoftFailureKind::Rejected),
            FetchOutcome::TimedOut => Some(SoftFailureKind::TimedOut),
            FetchOutcome::NetworkError { .. } => Some(SoftFailureKind::NetworkError),
        }
    }

    /// Human-readable failure description, `None` for `Success`
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Rejected { reason } | FetchOutcome::NetworkError { reason } => {
                Some(reason.clone())
            }
            FetchOutcome::TimedOut => Some("timed out".to_string()),
        }
    }
}

/// Kind of per-source failure absorbed by the fallback loop
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SoftFailureKind {
    /// Unexpected content type or oversized body
    Rejected,
    /// Deadline exceeded
    TimedOut,
    /// Transport failure or non-2xx status
    NetworkError,
}

/// Where a successful resolution came from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    /// A configured source, by position in the source list
    Source {
        /// Zero-based position in the source list
        index: usize,
        /// Source label (configured name or host)
        name: String,
    },
    /// The recovery probe
    Recovery,
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceRef::Source { index, name } => write!(f, "source #{} ({})", index, name),
            SourceRef::Recovery => f.write_str("recovery probe"),
        }
    }
}

/// Bytes obtained from a source, owned by the request flow until cached
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Image bytes
    pub bytes: Vec<u8>,
    /// Declared content type
    pub content_type: String,
}

/// How the caller can obtain the resolved artifact
#[derive(Clone, Debug)]
pub enum ArtifactLocation {
    /// Written to the artifact cache; serve by key
    Cached(CacheEntry),
    /// Fetched, but the cache was disabled or refused the write
    InMemory(ResolvedArtifact),
    /// Only a reference URL was recovered; no bytes were fetched
    Reference(url::Url),
}

/// Successful outcome of [`Resolver::resolve`](crate::Resolver::resolve)
#[derive(Clone, Debug)]
pub struct Resolution {
    /// The normalized identifier that was resolved
    pub identifier: Identifier,
    /// Which source produced the artifact
    pub source: SourceRef,
    /// The artifact or a reference to it
    pub artifact: ArtifactLocation,
}

/// Resolver events, broadcast to every subscriber
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A lookup passed normalization and entered the pipeline
    LookupStarted {
        /// Normalized identifier
        identifier: Identifier,
    },
    /// A source soft-failed; the loop moves on
    SourceFailed {
        /// Normalized identifier
        identifier: Identifier,
        /// Position in the source list
        index: usize,
        /// Source label
        source: String,
        /// Failure classification
        kind: SoftFailureKind,
        /// Failure description
        reason: String,
    },
    /// A lookup produced an artifact or reference
    Resolved {
        /// Normalized identifier
        identifier: Identifier,
        /// Producing source
        source: SourceRef,
        /// Cache key, when the artifact was persisted
        cache_key: Option<String>,
    },
    /// Every source and the recovery probe were exhausted
    NotFound {
        /// Normalized identifier
        identifier: Identifier,
    },
    /// The cache refused a write; the artifact is returned in memory
    CacheWriteFailed {
        /// Normalized identifier
        identifier: Identifier,
        /// Storage error
        error: String,
    },
    /// A cache sweep finished
    CacheSwept {
        /// Directory entries examined
        examined: usize,
        /// Entries evicted
        evicted: usize,
    },
    /// The resolver is shutting down
    Shutdown,
}

/// Point-in-time copy of the resolver counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatsSnapshot {
    /// Lookups received (including invalid ones)
    pub lookups: u64,
    /// Lookups rejected by normalization
    pub invalid_identifiers: u64,
    /// Lookups resolved from a configured source
    pub resolved: u64,
    /// Lookups resolved by the recovery probe
    pub recovered: u64,
    /// Lookups that exhausted every option
    pub not_found: u64,
    /// Per-source soft failures (all kinds)
    pub soft_failures: u64,
    /// Per-source timeouts (subset of soft failures)
    pub timeouts: u64,
    /// Cache writes that failed and fell back to memory
    pub cache_write_failures: u64,
}

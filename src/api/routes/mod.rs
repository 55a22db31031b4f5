//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`lookup`] — Identifier resolution (metadata and image bytes)
//! - [`cache`] — Serving cached artifacts by key
//! - [`system`] — Health, stats, events, OpenAPI

use crate::identifier::Identifier;
use crate::types::SourceRef;
use serde::{Deserialize, Serialize};

mod cache;
mod lookup;
mod system;

pub use cache::*;
pub use lookup::*;
pub use system::*;

/// Response body for GET /lookup/:id
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct LookupResponse {
    /// Always true; failures use the error body instead
    pub success: bool,
    /// Normalized identifier
    pub identifier: Identifier,
    /// Where the image can be fetched: a `/cache/<key>` path, the image
    /// endpoint, or an external URL for recovered references
    pub url: String,
    /// Cache key of the stored file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Human-readable size, e.g. "12.34 KB"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Content type of the artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Which source produced the result
    pub source: SourceRef,
    /// Whether the artifact was persisted to the cache
    pub cached: bool,
}

/// Format a byte count in kilobytes with two decimals
pub(crate) fn format_kilobytes(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

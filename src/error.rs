//! Error types for avatar-resolver
//!
//! This module provides the error taxonomy for the resolution pipeline:
//! - Input validation failures that never touch the network
//! - Exhaustion of every source and the recovery probe
//! - Storage and configuration failures
//! - HTTP status code mapping and structured error bodies for the API layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for avatar-resolver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for avatar-resolver
///
/// Per-source failures (rejections, timeouts, network errors) are deliberately
/// absent: they are absorbed by the resolver and reported as events, never as
/// errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The raw identifier had too few digits after normalization
    #[error("invalid identifier: expected at least {minimum} digits, found {digits}")]
    InvalidIdentifier {
        /// Number of digits left after stripping non-digit characters
        digits: usize,
        /// Minimum number of digits required
        minimum: usize,
    },

    /// Every source and the recovery probe were exhausted
    #[error("no artifact found for {0}")]
    NotFound(String),

    /// The artifact cache refused a write
    #[error("cache write failed for {path}: {reason}")]
    CacheWrite {
        /// The file the cache attempted to write
        path: PathBuf,
        /// The underlying storage error
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "cache.dir")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new lookups
    #[error("shutdown in progress: not accepting new lookups")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_identifier",
///     "message": "invalid identifier: expected at least 10 digits, found 4",
///     "details": {
///       "digits": 4,
///       "minimum": 10
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_identifier")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - invalid input
            Error::InvalidIdentifier { .. } => 400,
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 500 Internal Server Error - server-side issues
            Error::CacheWrite { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 502 Bad Gateway - upstream failure outside the fallback loop
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidIdentifier { .. } => "invalid_identifier",
            Error::NotFound(_) => "not_found",
            Error::CacheWrite { .. } => "cache_write_failed",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::InvalidIdentifier { digits, minimum } => Some(serde_json::json!({
                "digits": digits,
                "minimum": minimum,
            })),
            Error::NotFound(identifier) => Some(serde_json::json!({
                "identifier": identifier,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

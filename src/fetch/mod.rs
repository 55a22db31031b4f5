//! Fetch attempt execution
//!
//! A [`Fetcher`] is the outbound "fetch with timeout" capability the pipeline
//! consumes. [`AttemptExecutor`] turns a source descriptor and an identifier
//! into one bounded request and classifies the answer as a [`FetchOutcome`].
//!
//! The production fetcher is [`HttpFetcher`] (reqwest). Tests substitute a
//! scripted implementation so that the fallback policy can be exercised
//! without a network.

use crate::config::FetchConfig;
use crate::identifier::Identifier;
use crate::source::SourceDescriptor;
use crate::types::FetchOutcome;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

mod http;

pub use http::HttpFetcher;

/// A single outbound request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute request URL
    pub url: String,
    /// Request headers, applied in order
    pub headers: Vec<(String, String)>,
    /// Content-type prefixes that count as success; empty accepts anything
    pub accepted_content_types: Vec<String>,
    /// Hard deadline for the whole request, body included
    pub timeout: Duration,
}

impl FetchRequest {
    /// Whether a declared content type matches one of the accepted prefixes
    pub fn accepts(&self, content_type: &str) -> bool {
        if self.accepted_content_types.is_empty() {
            return true;
        }
        let content_type = content_type.trim().to_ascii_lowercase();
        self.accepted_content_types
            .iter()
            .any(|prefix| content_type.starts_with(&prefix.to_ascii_lowercase()))
    }
}

/// Outbound fetch capability
///
/// Implementations must never panic or return errors: every failure is
/// expressed as a [`FetchOutcome`] variant. Dropping the returned future must
/// release the underlying connection.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform one request and classify the response
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome;
}

/// Issues one bounded-time attempt per source
///
/// The deadline is enforced here as well as inside the fetcher, so a fetcher
/// that ignores `FetchRequest::timeout` still cannot stall the pipeline.
#[derive(Clone)]
pub struct AttemptExecutor {
    fetcher: Arc<dyn Fetcher>,
    defaults: FetchConfig,
}

impl AttemptExecutor {
    /// Create an executor with shared request defaults
    pub fn new(fetcher: Arc<dyn Fetcher>, defaults: FetchConfig) -> Self {
        Self { fetcher, defaults }
    }

    /// Default per-attempt deadline
    pub fn default_timeout(&self) -> Duration {
        self.defaults.timeout
    }

    /// Attempt one source for an identifier
    pub async fn attempt(
        &self,
        descriptor: &SourceDescriptor,
        id: &Identifier,
        timeout: Duration,
    ) -> FetchOutcome {
        let request = FetchRequest {
            url: descriptor.target_url(id),
            headers: self.headers_for(descriptor),
            accepted_content_types: descriptor.accepted_content_types.clone(),
            timeout,
        };
        self.run(request).await
    }

    /// Fetch an arbitrary page, accepting any content type
    pub async fn fetch_page(&self, url: String, timeout: Duration) -> FetchOutcome {
        let request = FetchRequest {
            url,
            headers: self.headers_for_page(),
            accepted_content_types: Vec::new(),
            timeout,
        };
        self.run(request).await
    }

    async fn run(&self, request: FetchRequest) -> FetchOutcome {
        tracing::debug!(
            url = %request.url,
            timeout_ms = request.timeout.as_millis() as u64,
            "fetch attempt"
        );

        match tokio::time::timeout(request.timeout, self.fetcher.fetch(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::TimedOut,
        }
    }

    /// User-Agent, then shared defaults, then per-source headers; later layers
    /// replace earlier ones case-insensitively
    fn headers_for(&self, descriptor: &SourceDescriptor) -> Vec<(String, String)> {
        let user_agent = ("User-Agent".to_string(), self.defaults.user_agent.clone());
        let layers = std::iter::once((&user_agent.0, &user_agent.1))
            .chain(self.defaults.headers.iter())
            .chain(descriptor.headers.iter());

        let mut headers: Vec<(String, String)> = Vec::new();
        for (name, value) in layers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
        headers
    }

    fn headers_for_page(&self) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), self.defaults.user_agent.clone()),
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,*/*;q=0.8".to_string(),
            ),
        ]
    }
}

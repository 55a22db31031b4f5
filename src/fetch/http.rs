//! reqwest-backed fetcher

use super::{FetchRequest, Fetcher};
use crate::config::FetchConfig;
use crate::error::Result;
use crate::types::FetchOutcome;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// Maximum redirects followed per attempt
const MAX_REDIRECTS: usize = 5;

/// Content type assumed for untyped responses when any type is accepted
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// HTTP fetcher built on a shared reqwest client
///
/// The body is read chunk by chunk so oversized responses are abandoned as soon
/// as they cross `max_body_bytes`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: u64,
}

impl HttpFetcher {
    /// Create a fetcher from the shared fetch configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return classify_error(e),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::NetworkError {
                reason: format!("HTTP {}", status),
            };
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content_type = match declared {
            Some(content_type) => content_type,
            None if request.accepted_content_types.is_empty() => {
                FALLBACK_CONTENT_TYPE.to_string()
            }
            None => {
                return FetchOutcome::Rejected {
                    reason: "missing content-type".to_string(),
                };
            }
        };

        if !request.accepts(&content_type) {
            return FetchOutcome::Rejected {
                reason: format!("unexpected content-type: {}", content_type),
            };
        }

        if let Some(length) = response.content_length()
            && length > self.max_body_bytes
        {
            return FetchOutcome::Rejected {
                reason: format!(
                    "body of {} bytes exceeds limit of {} bytes",
                    length, self.max_body_bytes
                ),
            };
        }

        let mut bytes = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if (bytes.len() + chunk.len()) as u64 > self.max_body_bytes {
                        return FetchOutcome::Rejected {
                            reason: format!(
                                "body exceeds limit of {} bytes",
                                self.max_body_bytes
                            ),
                        };
                    }
                    bytes.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => return classify_error(e),
            }
        }

        if bytes.is_empty() {
            return FetchOutcome::Rejected {
                reason: "empty body".to_string(),
            };
        }

        FetchOutcome::Success {
            bytes,
            content_type,
        }
    }
}

fn classify_error(error: reqwest::Error) -> FetchOutcome {
    if error.is_timeout() {
        FetchOutcome::TimedOut
    } else {
        FetchOutcome::NetworkError {
            reason: error.to_string(),
        }
    }
}

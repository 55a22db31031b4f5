//! Recovery probe: last-resort extraction of an image URL from a general page

use crate::config::RecoveryConfig;
use crate::error::{Error, Result};
use crate::fetch::AttemptExecutor;
use crate::identifier::Identifier;
use crate::source::substitute;
use crate::types::FetchOutcome;
use regex::Regex;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Compiled recovery configuration
#[derive(Clone, Debug)]
pub struct RecoveryProbe {
    url_template: String,
    pattern: Regex,
}

impl RecoveryProbe {
    /// Compile a recovery configuration
    ///
    /// # Errors
    /// Returns a configuration error if the pattern does not compile
    pub fn new(config: &RecoveryConfig) -> Result<Self> {
        let pattern = Regex::new(&config.pattern)
            .map_err(|e| Error::config("recovery.pattern", e.to_string()))?;
        Ok(Self {
            url_template: config.url_template.clone(),
            pattern,
        })
    }

    /// Fetch the page for `id` and extract a usable image URL
    ///
    /// Returns `None` when the page cannot be fetched, nothing matches, or the
    /// match is not an absolute http(s) URL.
    pub async fn probe(
        &self,
        executor: &AttemptExecutor,
        id: &Identifier,
        timeout: Duration,
    ) -> Option<Url> {
        let page_url = substitute(&self.url_template, id);

        let markup = match executor.fetch_page(page_url.clone(), timeout).await {
            FetchOutcome::Success { bytes, .. } => String::from_utf8_lossy(&bytes).into_owned(),
            other => {
                debug!(
                    identifier = %id,
                    url = %page_url,
                    reason = %other.failure_reason().unwrap_or_default(),
                    "recovery page unavailable"
                );
                return None;
            }
        };

        let extracted = self.extract(&markup);
        if extracted.is_none() {
            debug!(identifier = %id, url = %page_url, "no usable image URL in recovery page");
        }
        extracted
    }

    /// Apply the pattern to page markup
    pub fn extract(&self, markup: &str) -> Option<Url> {
        let captures = self.pattern.captures(markup)?;
        let literal = captures.get(1).or_else(|| captures.get(0))?.as_str();

        let decoded = decode_json_literal(literal);
        let url = Url::parse(decoded.trim()).ok()?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Some(url),
            _ => None,
        }
    }
}

/// Undo JSON string escaping (`\/`, `\u0026`, ...) the page may embed
fn decode_json_literal(literal: &str) -> String {
    if !literal.contains('\\') {
        return literal.to_string();
    }
    serde_json::from_str::<String>(&format!("\"{}\"", literal))
        .unwrap_or_else(|_| literal.to_string())
}

//! Source descriptors and URL template substitution

use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use utoipa::ToSchema;

/// Placeholder replaced by the normalized identifier in URL templates
pub const PLACEHOLDER: &str = "{id}";

/// One candidate source in the ordered source list
///
/// A template without a placeholder is a fixed lookup endpoint and is requested
/// verbatim regardless of the identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SourceDescriptor {
    /// Display name used in logs, events and API responses
    #[serde(default)]
    pub name: Option<String>,

    /// URL with `{id}` placeholders (e.g. "https://img.example.com/{id}.jpg")
    pub url_template: String,

    /// Content-type prefixes accepted as a success (default: ["image/"])
    ///
    /// An empty list accepts any content type.
    #[serde(default = "default_accepted_content_types")]
    pub accepted_content_types: Vec<String>,

    /// Per-source deadline, overriding `fetch.timeout_ms`
    #[serde(
        rename = "timeout_ms",
        default,
        with = "crate::config::optional_duration_ms_serde"
    )]
    #[schema(value_type = Option<u64>)]
    pub timeout: Option<Duration>,

    /// Extra headers for this source (e.g. a Referer)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SourceDescriptor {
    /// Create a descriptor accepting images, with no name or overrides
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            name: None,
            url_template: url_template.into(),
            accepted_content_types: default_accepted_content_types(),
            timeout: None,
            headers: BTreeMap::new(),
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the concrete request URL for an identifier
    pub fn target_url(&self, id: &Identifier) -> String {
        substitute(&self.url_template, id)
    }

    /// Whether the template ignores the identifier
    pub fn is_fixed_endpoint(&self) -> bool {
        !self.url_template.contains(PLACEHOLDER)
    }

    /// Label for logs: the configured name, or the template host
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        url::Url::parse(&self.url_template.replace(PLACEHOLDER, "0"))
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url_template.clone())
    }
}

/// Replace every `{id}` placeholder in `template`
pub(crate) fn substitute(template: &str, id: &Identifier) -> String {
    template.replace(PLACEHOLDER, id.as_str())
}

fn default_accepted_content_types() -> Vec<String> {
    vec!["image/".to_string()]
}

//! Configuration types for avatar-resolver

use crate::error::{Error, Result};
use crate::identifier::{Identifier, MIN_DIGITS};
use crate::source::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration for the resolver
///
/// The source list is data, not code: it is loaded once at startup and handed to
/// the [`Resolver`](crate::Resolver) at construction time.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Ordered candidate sources; earlier entries are preferred
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,

    /// Outbound request behavior shared by every attempt
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Last-resort page scrape, tried once when every source soft-fails
    #[serde(default)]
    pub recovery: Option<RecoveryConfig>,

    /// Ephemeral artifact storage
    #[serde(default)]
    pub cache: CacheConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        // Any well-formed identifier works for checking template substitution
        let sample = Identifier::normalize(&"0".repeat(MIN_DIGITS))?;

        for (index, source) in self.sources.iter().enumerate() {
            let key = format!("sources[{}].url_template", index);
            check_http_url(&source.target_url(&sample), &key)?;

            if source.timeout == Some(Duration::ZERO) {
                return Err(Error::config(
                    format!("sources[{}].timeout_ms", index),
                    "must be greater than zero",
                ));
            }
        }

        if self.fetch.timeout.is_zero() {
            return Err(Error::config("fetch.timeout_ms", "must be greater than zero"));
        }
        if self.fetch.max_concurrent_lookups == 0 {
            return Err(Error::config(
                "fetch.max_concurrent_lookups",
                "must be greater than zero",
            ));
        }

        if let Some(recovery) = &self.recovery {
            let url = crate::source::substitute(&recovery.url_template, &sample);
            check_http_url(&url, "recovery.url_template")?;
            regex::Regex::new(&recovery.pattern)
                .map_err(|e| Error::config("recovery.pattern", e.to_string()))?;
        }

        if self.cache.ttl.is_zero() {
            return Err(Error::config("cache.ttl_secs", "must be greater than zero"));
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(Error::config(
                "cache.sweep_interval_secs",
                "must be greater than zero",
            ));
        }
        if self.cache.sweep_batch_limit == 0 {
            return Err(Error::config(
                "cache.sweep_batch_limit",
                "must be greater than zero",
            ));
        }
        if self.cache.prefix.is_empty() || !self.cache.prefix.chars().all(is_key_char) {
            return Err(Error::config(
                "cache.prefix",
                "must be non-empty and contain only ASCII letters, digits, '-' or '_'",
            ));
        }

        Ok(())
    }
}

fn check_http_url(candidate: &str, key: &str) -> Result<()> {
    let url = url::Url::parse(candidate)
        .map_err(|e| Error::config(key, format!("{} is not a valid URL: {}", candidate, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::config(
            key,
            format!("unsupported scheme {} (expected http or https)", other),
        )),
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Outbound request configuration applied to every source attempt
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Hard deadline for a single attempt (default: 7000 ms)
    #[serde(
        rename = "timeout_ms",
        default = "default_fetch_timeout",
        with = "duration_ms_serde"
    )]
    #[schema(value_type = u64)]
    pub timeout: Duration,

    /// User-Agent sent with every attempt
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Headers sent with every attempt (per-source headers override these)
    #[serde(default = "default_fetch_headers")]
    pub headers: BTreeMap<String, String>,

    /// Largest body accepted from a source (default: 10 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// Maximum number of lookups running at once (default: 32)
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
            headers: default_fetch_headers(),
            max_body_bytes: default_max_body_bytes(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
        }
    }
}

/// Recovery probe configuration
///
/// The page at `url_template` is fetched once and `pattern` is applied to the
/// markup. The first capture group (or the whole match when the pattern has no
/// groups) must yield an absolute http(s) URL.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RecoveryConfig {
    /// Page to scrape, with an optional `{id}` placeholder
    pub url_template: String,

    /// Regex locating the embedded image URL literal
    #[serde(default = "default_recovery_pattern")]
    pub pattern: String,
}

/// Artifact cache configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CacheConfig {
    /// Persist resolved artifacts (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding cached artifacts (default: "temp")
    #[serde(default = "default_cache_dir")]
    #[schema(value_type = String)]
    pub dir: PathBuf,

    /// Prefix for generated file names (default: "avatar")
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,

    /// Age after which an entry is evicted (default: 300 seconds)
    #[serde(rename = "ttl_secs", default = "default_cache_ttl", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub ttl: Duration,

    /// How often the sweeper runs (default: 300 seconds)
    #[serde(
        rename = "sweep_interval_secs",
        default = "default_sweep_interval",
        with = "duration_serde"
    )]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,

    /// Maximum directory entries examined per sweep (default: 50)
    #[serde(default = "default_sweep_batch_limit")]
    pub sweep_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            prefix: default_cache_prefix(),
            ttl: default_cache_ttl(),
            sweep_interval: default_sweep_interval(),
            sweep_batch_limit: default_sweep_batch_limit(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:3000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Directory with a browser front-end, served for unmatched paths
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            static_dir: None,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_fetch_timeout() -> Duration {
    Duration::from_millis(7000)
}

fn default_user_agent() -> String {
    format!("avatar-resolver/{}", env!("CARGO_PKG_VERSION"))
}

fn default_fetch_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Accept".to_string(), "image/*,*/*;q=0.8".to_string())])
}

fn default_max_body_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_max_concurrent_lookups() -> usize {
    32
}

fn default_recovery_pattern() -> String {
    r#""previewable_image_url":"([^"]+)""#.to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_cache_prefix() -> String {
    "avatar".to_string()
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(300) // 5 minutes
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(300) // 5 minutes
}

fn default_sweep_batch_limit() -> usize {
    50
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
pub(crate) mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper (milliseconds)
pub(crate) mod optional_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

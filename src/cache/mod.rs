//! Ephemeral artifact cache
//!
//! Resolved artifacts are written once into a dedicated directory under a
//! generated, collision-resistant key and served back by that key until a sweep
//! evicts them. Entry age is the file modification time.
//!
//! Keys have the shape `{prefix}-{identifier}-{unix_millis}-{seq}-{rand}.{ext}`.
//! The per-process sequence number keeps keys distinct under burst load; the
//! random suffix keeps them distinct across processes sharing a directory.

use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::types::ResolvedArtifact;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};
use utoipa::ToSchema;

mod sweeper;

pub use sweeper::CacheSweeper;

/// Longest key accepted on the read path
const MAX_KEY_LEN: usize = 255;

/// A persisted artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheEntry {
    /// Generated file name; the only handle callers need
    pub key: String,
    /// Full path on disk
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Stored size
    pub size_bytes: u64,
    /// Content type the artifact was stored with
    pub content_type: String,
    /// Creation time (file modification time after the write)
    pub created_at: DateTime<Utc>,
}

/// Artifact bytes read back by key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedArtifact {
    /// Cache key
    pub key: String,
    /// Stored bytes
    pub bytes: Vec<u8>,
    /// Content type derived from the key's extension
    pub content_type: String,
}

/// Outcome of one sweep pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Directory entries looked at
    pub examined: usize,
    /// Entries removed because they outlived the TTL
    pub evicted: usize,
    /// Expired entries that could not be removed
    pub failed: usize,
}

/// File-backed artifact cache
pub struct ArtifactCache {
    dir: PathBuf,
    prefix: String,
    sweep_batch_limit: usize,
    sequence: AtomicU64,
}

impl ArtifactCache {
    /// Create a cache rooted at `dir`
    ///
    /// The directory is created lazily by [`put`](Self::put).
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        sweep_batch_limit: usize,
    ) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            sweep_batch_limit: sweep_batch_limit.max(1),
            sequence: AtomicU64::new(0),
        }
    }

    /// Directory holding the cached files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an artifact under a freshly generated key
    ///
    /// The bytes are written to a hidden partial file and renamed into place,
    /// so a concurrent reader never observes a half-written artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheWrite`] if the directory cannot be created or the
    /// file cannot be written.
    pub async fn put(&self, id: &Identifier, artifact: &ResolvedArtifact) -> Result<CacheEntry> {
        match fs::create_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists && self.dir.is_dir() => {}
            Err(e) => return Err(write_error(&self.dir, e)),
        }

        let key = self.generate_key(id, &artifact.content_type);
        let path = self.dir.join(&key);
        let partial = self.dir.join(format!(".{}.part", key));

        if let Err(e) = fs::write(&partial, &artifact.bytes).await {
            fs::remove_file(&partial).await.ok();
            return Err(write_error(&partial, e));
        }
        if let Err(e) = fs::rename(&partial, &path).await {
            fs::remove_file(&partial).await.ok();
            return Err(write_error(&path, e));
        }

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| write_error(&path, e))?;
        let created_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        debug!(key = %key, size = metadata.len(), "artifact cached");

        Ok(CacheEntry {
            key,
            path,
            size_bytes: metadata.len(),
            content_type: artifact.content_type.clone(),
            created_at,
        })
    }

    /// Read an artifact back by key
    ///
    /// A missing file (never written, already swept, or removed while being
    /// read) and a malformed key are both a plain miss.
    pub async fn get(&self, key: &str) -> Result<Option<CachedArtifact>> {
        if !is_valid_key(key) {
            debug!(key = %key, "rejected malformed cache key");
            return Ok(None);
        }

        match fs::read(self.dir.join(key)).await {
            Ok(bytes) => Ok(Some(CachedArtifact {
                key: key.to_string(),
                bytes,
                content_type: content_type_for_key(key).to_string(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Delete an entry explicitly; returns whether it existed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        if !is_valid_key(key) {
            return Ok(false);
        }

        match fs::remove_file(self.dir.join(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Evict entries older than `ttl` relative to `now`
    ///
    /// An entry whose age equals `ttl` exactly is kept. At most
    /// `sweep_batch_limit` directory entries are examined per call. Errors are
    /// logged and counted, never returned.
    pub async fn sweep(&self, now: SystemTime, ttl: Duration) -> SweepReport {
        let mut report = SweepReport::default();
        if let Some(mut entries) = self.open_dir().await {
            self.sweep_batch(&mut entries, now, ttl, &mut report).await;
        }
        report
    }

    /// Evict expired entries across the whole directory
    ///
    /// Walks one directory listing in batches of `sweep_batch_limit` entries,
    /// yielding to the runtime between batches, so a backlog larger than one
    /// batch is cleared in a single pass.
    pub async fn sweep_all(&self, now: SystemTime, ttl: Duration) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(mut entries) = self.open_dir().await else {
            return report;
        };
        while self.sweep_batch(&mut entries, now, ttl, &mut report).await {
            tokio::task::yield_now().await;
        }
        report
    }

    async fn open_dir(&self) -> Option<fs::ReadDir> {
        match fs::read_dir(&self.dir).await {
            Ok(entries) => Some(entries),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(dir = ?self.dir, error = %e, "failed to read cache directory");
                None
            }
        }
    }

    /// Examine up to one batch of entries; `true` if the listing has more
    async fn sweep_batch(
        &self,
        entries: &mut fs::ReadDir,
        now: SystemTime,
        ttl: Duration,
        report: &mut SweepReport,
    ) -> bool {
        let mut examined = 0;
        while examined < self.sweep_batch_limit {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => return false,
                Err(e) => {
                    warn!(dir = ?self.dir, error = %e, "failed to iterate cache directory");
                    return false;
                }
            };
            examined += 1;
            report.examined += 1;

            let path = entry.path();
            let modified = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => match metadata.modified() {
                    Ok(modified) => modified,
                    Err(e) => {
                        warn!(?path, error = %e, "cache entry has no modification time");
                        continue;
                    }
                },
                Ok(_) => continue,
                // Removed between listing and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(?path, error = %e, "failed to stat cache entry");
                    continue;
                }
            };

            // Entries from the future (clock skew) have age zero
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= ttl {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(?path, age_secs = age.as_secs(), "evicted cache entry");
                    report.evicted += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(?path, error = %e, "failed to evict cache entry");
                    report.failed += 1;
                }
            }
        }
        true
    }

    fn generate_key(&self, id: &Identifier, content_type: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let salt: u16 = rand::thread_rng().r#gen();
        format!(
            "{}-{}-{}-{}-{:04x}.{}",
            self.prefix,
            id,
            Utc::now().timestamp_millis(),
            seq,
            salt,
            extension_for(content_type)
        )
    }
}

fn write_error(path: &Path, error: std::io::Error) -> Error {
    Error::CacheWrite {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

/// Whether `key` could have been produced by [`ArtifactCache::put`]
///
/// Rejects path separators, hidden files (including partial writes) and
/// anything outside a conservative character set.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && !key.contains("..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Image types the cache can store and serve back, by extension
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("webp", "image/webp"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("tiff", "image/tiff"),
    ("ico", "image/x-icon"),
    ("heic", "image/heic"),
    ("jpg", "image/jpeg"),
];

/// File extension for a content type (`jpg` unless recognized)
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let essence = match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg",
        "image/vnd.microsoft.icon" => "image/x-icon",
        "image/tif" => "image/tiff",
        "image/heif" => "image/heic",
        other => other,
    };
    IMAGE_TYPES
        .iter()
        .find(|(_, mime)| *mime == essence)
        .map_or("jpg", |(ext, _)| ext)
}

/// Content type for a stored key, from its extension
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    IMAGE_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map_or("image/jpeg", |(_, mime)| mime)
}

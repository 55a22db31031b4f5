//! Shared test helpers: a scripted fetch capability and resolver builders.

use crate::config::{Config, RecoveryConfig};
use crate::fetch::{FetchRequest, Fetcher};
use crate::resolver::Resolver;
use crate::source::SourceDescriptor;
use crate::types::FetchOutcome;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

/// Scripted reply for one URL
#[derive(Clone)]
pub(crate) enum Reply {
    Outcome(FetchOutcome),
    /// Never completes; the request must be abandoned by a deadline or cancellation
    Hang,
}

/// Fake fetch capability that records every requested URL
///
/// URLs without a scripted reply get a network error.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
    pub(crate) hang_dropped: Arc<AtomicBool>,
}

/// Sets a flag when the hanging fetch future is dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ScriptedFetcher {
    pub(crate) fn reply(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }

    pub(crate) fn image(self, url: &str, bytes: &[u8]) -> Self {
        self.typed(url, "image/jpeg", bytes)
    }

    pub(crate) fn page(self, url: &str, markup: &str) -> Self {
        self.typed(url, "text/html", markup.as_bytes())
    }

    pub(crate) fn rejected(self, url: &str) -> Self {
        self.reply(
            url,
            Reply::Outcome(FetchOutcome::Rejected {
                reason: "unexpected content-type: text/html".into(),
            }),
        )
    }

    fn typed(self, url: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.reply(
            url,
            Reply::Outcome(FetchOutcome::Success {
                bytes: bytes.to_vec(),
                content_type: content_type.into(),
            }),
        )
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        self.calls.lock().unwrap().push(request.url.clone());
        match self.replies.get(&request.url) {
            Some(Reply::Outcome(outcome)) => outcome.clone(),
            Some(Reply::Hang) => {
                let _flag = DropFlag(self.hang_dropped.clone());
                std::future::pending::<FetchOutcome>().await
            }
            None => FetchOutcome::NetworkError {
                reason: "connection refused".into(),
            },
        }
    }
}

/// Config with the given source templates, a short timeout and a cache inside `temp_dir`
///
/// With `recovery` set, the probe reads `https://page.example.com/{id}`.
pub(crate) fn test_config(temp_dir: &TempDir, sources: &[&str], recovery: bool) -> Config {
    let mut config = Config {
        sources: sources
            .iter()
            .map(|template| SourceDescriptor::new(*template))
            .collect(),
        ..Default::default()
    };
    config.fetch.timeout = Duration::from_millis(200);
    config.cache.dir = temp_dir.path().join("cache");
    if recovery {
        config.recovery = Some(RecoveryConfig {
            url_template: "https://page.example.com/{id}".into(),
            pattern: r#""previewable_image_url":"([^"]+)""#.into(),
        });
    }
    config
}

/// Build a resolver over a scripted fetcher.
/// Returns the tempdir too, which must be kept alive.
pub(crate) fn create_test_resolver(
    sources: &[&str],
    recovery: bool,
    fetcher: ScriptedFetcher,
) -> (Resolver, Arc<ScriptedFetcher>, TempDir) {
    let temp_dir = tempdir().unwrap();
    let fetcher = Arc::new(fetcher);
    let resolver =
        Resolver::with_fetcher(test_config(&temp_dir, sources, recovery), fetcher.clone()).unwrap();
    (resolver, fetcher, temp_dir)
}

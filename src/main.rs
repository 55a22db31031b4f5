//! avatar-resolver HTTP service
//!
//! Loads a JSON configuration, starts the cache sweeper and serves the REST API
//! until SIGINT/SIGTERM.

use avatar_resolver::{Config, Resolver, api};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolve identifiers to images from an ordered list of sources
#[derive(Parser)]
#[command(name = "avatar-resolver")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file (defaults apply when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding `server.api.bind_address`
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            Config::from_file(path)?
        }
        None => Config::default(),
    };

    if let Some(bind) = cli.bind {
        config.server.api.bind_address = bind;
    }
    if let Ok(port) = std::env::var("PORT") {
        let port: u16 = port
            .parse()
            .map_err(|e| format!("invalid PORT value {:?}: {}", port, e))?;
        config.server.api.bind_address.set_port(port);
    }

    if config.sources.is_empty() {
        tracing::warn!("no sources configured; every lookup will fall back to recovery or fail");
    }

    let config = Arc::new(config);
    let resolver = Arc::new(Resolver::new((*config).clone())?);
    let sweeper = resolver.start_cache_sweeper();

    api::start_api_server(
        resolver.clone(),
        config,
        avatar_resolver::shutdown_on_signal(resolver),
    )
    .await?;

    sweeper.stop().await;
    tracing::info!("shutdown complete");
    Ok(())
}

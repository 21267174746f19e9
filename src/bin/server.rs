//! tandem-server - WebSocket synchronization server

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tandem::bus::RedisBus;
use tandem::config::Config;
use tandem::rules::ChessRules;
use tandem::server::{ServerContext, ServerListener};
use tandem::store::RedisStore;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "tandem-server")]
#[command(about = "tandem session synchronization server")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(addr) = cli.listen {
        config.server.listen_addr = addr;
    }

    // The store is the one dependency the server cannot run without
    let store = RedisStore::connect(&config.store.redis_url, config.store.key_prefix.clone())
        .await
        .context("Failed to initialize the shared store")?;
    let bus = RedisBus::connect(&config.store.redis_url, config.store.channel_prefix.clone())
        .await
        .context("Failed to initialize the event bus")?;

    let ctx = Arc::new(ServerContext::new(
        config.server.clone(),
        Arc::new(store),
        Arc::new(bus),
        Arc::new(ChessRules::new()),
    ));

    let listener = ServerListener::bind(ctx).await?;
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    listener.run(shutdown_rx).await
}

//! tandem - administer sessions in the shared store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tandem::clock::TimeControl;
use tandem::config::Config;
use tandem::rules::ChessRules;
use tandem::server::{SessionInfo, SessionManager};
use tandem::store::{RedisStore, StateStore};
use tandem::Side;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Create, join and inspect synchronized two-player sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new session
    Create {
        /// Side the creator plays (w or b)
        #[arg(long, default_value = "w")]
        color: String,
        /// Time control, e.g. "5|3", "10|5" or "15|10"
        #[arg(long)]
        time: Option<String>,
    },
    /// Seat an identity in a session
    Join {
        /// Session id
        id: String,
        /// Guest identity to seat
        #[arg(long)]
        identity: String,
        /// Preferred side (w or b)
        #[arg(long)]
        color: Option<String>,
    },
    /// Print a session record
    Show {
        /// Session id
        id: String,
    },
    /// Check that the shared store is reachable
    Status,
}

fn parse_side(value: &str) -> Result<Side> {
    Side::parse(value).with_context(|| format!("Unknown side '{}', expected w or b", value))
}

fn print_info(info: &SessionInfo) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(info)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let store: Arc<dyn StateStore> = Arc::new(
        RedisStore::connect(&config.store.redis_url, config.store.key_prefix.clone())
            .await
            .context("Failed to connect to the shared store")?,
    );
    let sessions = SessionManager::new(
        Arc::clone(&store),
        Arc::new(ChessRules::new()),
        config.store.session_ttl(),
    );

    match cli.command {
        Commands::Create { color, time } => {
            let side = parse_side(&color)?;
            let time = time.unwrap_or_else(|| config.session.default_time_control.clone());
            let created = sessions.create(side, TimeControl::parse(&time)).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
            Ok(())
        }
        Commands::Join {
            id,
            identity,
            color,
        } => {
            let preferred = color.as_deref().map(parse_side).transpose()?;
            let side = sessions.join(&id, &identity, preferred).await?;
            tracing::info!("{} plays {} in {}", identity, side, id);
            print_info(&sessions.info(&id).await?)
        }
        Commands::Show { id } => print_info(&sessions.info(&id).await?),
        Commands::Status => {
            store.ping().await.context("Shared store is not responding")?;
            println!("store: ok ({})", config.store.redis_url);
            Ok(())
        }
    }
}

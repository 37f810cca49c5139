//! Chatvault - chat history archival with challenge-based verification
//!
//! A Telegram bot that archives conversation history into per-chat keyed
//! stores and verifies it against the live service on demand.

use anyhow::Result;
use chatvault::bot::Dispatcher;
use chatvault::config::ChatVaultConfig;
use chatvault::store::StoreRouter;
use chatvault::transport::{ChatTransport, TelegramTransport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chatvault")]
#[command(version)]
#[command(about = "Chat history archival with challenge-based verification")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CHATVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the archiver bot
    Run,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("chatvault={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = if let Some(config_path) = cli.config {
        let content = std::fs::read_to_string(&config_path)?;
        toml::from_str(&content)?
    } else {
        ChatVaultConfig::default()
    };

    match cli.command {
        Commands::Run => run_bot(config).await?,
        Commands::Config { default } => show_config(if default { None } else { Some(&config) })?,
    }

    Ok(())
}

async fn run_bot(config: ChatVaultConfig) -> Result<()> {
    // A missing verification sink is fatal before any event is served
    config.validate()?;

    tracing::info!("Starting chatvault");

    let telegram = Arc::new(TelegramTransport::new(&config.telegram)?);
    let transport: Arc<dyn ChatTransport> = telegram.clone();
    let router = Arc::new(StoreRouter::new(config.archive.data_dir.clone()));
    let dispatcher = Arc::new(Dispatcher::new(transport, router, &config)?);

    let poller = tokio::spawn(dispatcher.run(telegram));

    tracing::info!("chatvault is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    poller.abort();

    Ok(())
}

fn show_config(config: Option<&ChatVaultConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}

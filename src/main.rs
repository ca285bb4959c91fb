use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use tradeplex::adapter::outbound::{
    binance, MemoryWithdrawStore, ReqwestTransport, TungsteniteDialer,
};
use tradeplex::application::{Engine, VenueFactories};
use tradeplex::infrastructure::config::Config;
use tradeplex::port::{HttpTransport, WsDialer};

/// Tradeplex - multi-venue trading engine.
#[derive(Parser, Debug)]
#[command(name = "tradeplex")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start every enabled venue and run until interrupted (default)
    Run,
    /// Validate the configuration file and exit
    Check,
}

fn factories(config: &Config) -> VenueFactories {
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::default());
    let dialer: Arc<dyn WsDialer> = Arc::new(TungsteniteDialer);
    let mut factories = VenueFactories::new();
    factories.insert(
        binance::NAME,
        binance::factory(
            transport,
            dialer,
            config.websocket.clone(),
            config.rate_limiter.clone(),
        ),
    );
    factories
}

async fn run(config: Config) -> anyhow::Result<()> {
    let factories = factories(&config);
    let engine = Engine::bootstrap(config, &factories, Arc::new(MemoryWithdrawStore::new()))
        .await
        .context("bootstrap failed")?;

    let failed = engine.start().await;
    for name in &failed {
        warn!(venue = %name, "Venue failed to start and was disabled");
    }
    info!(venues = ?engine.exchanges(true), "Engine running");

    signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("Shutdown signal received");
    engine.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.init();

    match cli.command.unwrap_or(Command::Run) {
        Command::Check => {
            info!(
                name = %config.name,
                exchanges = config.exchanges.len(),
                "Configuration is valid"
            );
        }
        Command::Run => {
            info!(name = %config.name, "tradeplex starting");
            if let Err(e) = run(config).await {
                error!(error = %e, "Fatal error");
                std::process::exit(1);
            }
            info!("tradeplex stopped");
        }
    }
}

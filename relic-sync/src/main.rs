//! Relic Historical Sync CLI
//!
//! Entry point for the sync binary. Provides subcommands for:
//! - `run` - Sync the configured sources up to the finalized block
//! - `version` - Show version information

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use alloy::providers::ProviderBuilder;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

use evm_client::AlloyChainClient;
use relic_sync::config::Settings;
use relic_sync::error::{Result, SyncError};
use relic_sync::store::MemoryEventStore;
use relic_sync::sync::{HistoricalSyncService, NetworkConfig, SyncConfig};
use relic_sync::types::SyncEvent;

/// Relic Historical Sync
#[derive(Parser, Debug)]
#[command(name = "relic-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment name (selects config/{environment}.toml)
    #[arg(short, long, default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync the configured sources up to the finalized block
    Run {
        /// Override the finalized block instead of asking the node
        #[arg(long)]
        finalized_block: Option<u64>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "relic-sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            println!("relic-sync {}", relic_sync::VERSION);
            Ok(())
        }
        Commands::Run { finalized_block } => run_sync(&cli.environment, finalized_block).await,
    }
}

async fn run_sync(environment: &str, finalized_override: Option<u64>) -> Result<()> {
    let settings = Settings::load(environment)
        .map_err(|err| SyncError::Config(format!("failed to load settings: {err}")))?;
    settings
        .validate()
        .map_err(|errors| SyncError::Config(errors.join("; ")))?;

    info!(
        version = relic_sync::VERSION,
        network = %settings.network.name,
        sources = settings.sources.len(),
        "starting relic-sync"
    );

    if settings.metrics.enabled {
        let address: SocketAddr = format!("{}:{}", settings.metrics.host, settings.metrics.port)
            .parse()
            .map_err(|err| SyncError::Config(format!("invalid metrics listen address: {err}")))?;
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()
            .map_err(|err| SyncError::Config(format!("failed to install metrics: {err}")))?;
        info!(%address, "serving prometheus metrics");
    }

    let provider = ProviderBuilder::new()
        .connect(&settings.network.rpc_url)
        .await
        .map_err(|err| SyncError::Config(format!("failed to connect provider: {err}")))?;
    let chain = Arc::new(AlloyChainClient::new(
        provider,
        settings.network.name.clone(),
    ));

    let finalized_block = match finalized_override {
        Some(block) => block,
        None => chain.finalized_block_number().await?,
    };
    info!(finalized_block, "resolved historical sync upper bound");

    let config = SyncConfig {
        network: NetworkConfig {
            name: settings.network.name.clone(),
            chain_id: settings.network.chain_id,
            default_max_block_range: settings.network.default_max_block_range,
            max_rpc_request_concurrency: settings.network.max_rpc_request_concurrency,
        },
        finalized_block,
        sources: settings.event_sources()?,
    };

    let store = Arc::new(MemoryEventStore::new());
    let (service, mut events) = HistoricalSyncService::new(config, chain, store)?;
    service.setup().await?;
    service.start();

    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::HistoricalCheckpoint {
                block_number,
                block_timestamp,
            } => {
                info!(block_number, block_timestamp, "historical checkpoint");
            }
            SyncEvent::SyncComplete => {
                info!("historical sync complete");
                break;
            }
        }
    }

    Ok(())
}

//! Configuration loading and validation.
//!
//! Settings are layered: `config/default.toml`, then an environment-specific
//! file, then environment variables with the `RELIC` prefix. All settings
//! have sensible defaults; event sources are declared as an array of tables
//! and converted into domain [`EventSource`]s with full hex validation.

use std::str::FromStr;

use alloy::primitives::{Address, B256};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use evm_client::Topics;

use crate::error::SyncError;
use crate::types::{
    ChildAddressLocation, EventSource, FactoryCriteria, FactorySource, LogFilterCriteria,
    LogFilterSource,
};

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Network and RPC configuration.
    pub network: NetworkSettings,
    /// Event source declarations.
    pub sources: Vec<SourceSettings>,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Metrics exposition configuration.
    pub metrics: MetricsSettings,
}

/// Network and RPC configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    /// Network name (metrics and log label).
    pub name: String,
    /// Chain id (for store keying and validation).
    pub chain_id: u64,
    /// RPC endpoint URL.
    pub rpc_url: String,
    /// Maximum `eth_getLogs` block range for sources without an override.
    pub default_max_block_range: u64,
    /// Maximum concurrent RPC-bound tasks.
    pub max_rpc_request_concurrency: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default tracing filter (overridden by `RUST_LOG`).
    pub level: String,
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Whether to serve Prometheus metrics.
    pub enabled: bool,
    /// Listen host.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

/// One event source declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    /// Unique source name.
    pub name: String,
    /// Contract addresses to filter on (log-filter sources).
    #[serde(default)]
    pub address: Option<Vec<String>>,
    /// Topic constraints by position; an empty inner list means
    /// unconstrained.
    #[serde(default)]
    pub topics: Option<Vec<Vec<String>>>,
    /// First block to sync.
    pub start_block: u64,
    /// Last block to sync (defaults to the finalized block).
    #[serde(default)]
    pub end_block: Option<u64>,
    /// Per-source `eth_getLogs` range override.
    #[serde(default)]
    pub max_block_range: Option<u64>,
    /// Present for factory sources.
    #[serde(default)]
    pub factory: Option<FactorySettings>,
}

/// Factory-specific source settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FactorySettings {
    /// The factory contract address.
    pub address: String,
    /// Event signature of the child-announcement log.
    pub event_selector: String,
    /// Where the child address lives (`topic1..topic3` or `offset<bytes>`).
    pub child_address_location: String,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `RELIC` prefix
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        Config::builder()
            // Start with default values
            .set_default("network.name", "mainnet")?
            .set_default("network.chain_id", 1)?
            .set_default("network.rpc_url", "http://localhost:8545")?
            .set_default("network.default_max_block_range", 10_000)?
            .set_default("network.max_rpc_request_concurrency", 10)?
            .set_default("sources", Vec::<String>::new())?
            .set_default("logging.level", "info")?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.host", "0.0.0.0")?
            .set_default("metrics.port", 9090)?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (RELIC prefix)
            .add_source(
                Environment::with_prefix("RELIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.network.name.is_empty() {
            errors.push("network.name cannot be empty".into());
        }
        if self.network.rpc_url.is_empty() {
            errors.push("network.rpc_url cannot be empty".into());
        }
        if self.network.chain_id == 0 {
            errors.push("network.chain_id must be non-zero".into());
        }
        if self.network.default_max_block_range == 0 {
            errors.push("network.default_max_block_range must be non-zero".into());
        }
        if self.network.max_rpc_request_concurrency == 0 {
            errors.push("network.max_rpc_request_concurrency must be non-zero".into());
        }

        for source in &self.sources {
            if let Err(error) = source.to_event_source(self.network.chain_id) {
                errors.push(format!("source {}: {error}", source.name));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Convert every declared source into its domain type.
    ///
    /// # Errors
    /// Returns [`SyncError::Config`] for unparseable addresses, topics, or
    /// child address locations.
    pub fn event_sources(&self) -> Result<Vec<EventSource>, SyncError> {
        self.sources
            .iter()
            .map(|source| source.to_event_source(self.network.chain_id))
            .collect()
    }
}

impl SourceSettings {
    fn to_event_source(&self, chain_id: u64) -> Result<EventSource, SyncError> {
        let topics = parse_topics(self.topics.as_deref())?;

        if let Some(factory) = &self.factory {
            let criteria = FactoryCriteria {
                address: parse_address(&factory.address)?,
                event_selector: parse_topic(&factory.event_selector)?,
                child_address_location: factory
                    .child_address_location
                    .parse::<ChildAddressLocation>()
                    .map_err(|error| SyncError::Config(error.to_string()))?,
                topics,
            };
            return Ok(EventSource::Factory(FactorySource {
                name: self.name.clone(),
                chain_id,
                criteria,
                start_block: self.start_block,
                end_block: self.end_block,
                max_block_range: self.max_block_range,
            }));
        }

        let address = self
            .address
            .as_ref()
            .map(|addresses| addresses.iter().map(|a| parse_address(a)).collect())
            .transpose()?;
        Ok(EventSource::LogFilter(LogFilterSource {
            name: self.name.clone(),
            chain_id,
            criteria: LogFilterCriteria { address, topics },
            start_block: self.start_block,
            end_block: self.end_block,
            max_block_range: self.max_block_range,
        }))
    }
}

fn parse_address(text: &str) -> Result<Address, SyncError> {
    Address::from_str(text).map_err(|_| SyncError::Config(format!("invalid address: {text}")))
}

fn parse_topic(text: &str) -> Result<B256, SyncError> {
    B256::from_str(text).map_err(|_| SyncError::Config(format!("invalid topic: {text}")))
}

fn parse_topics(topics: Option<&[Vec<String>]>) -> Result<Topics, SyncError> {
    let mut parsed: Topics = [None, None, None, None];
    let Some(topics) = topics else {
        return Ok(parsed);
    };
    if topics.len() > 4 {
        return Err(SyncError::Config(format!(
            "too many topic positions: {}",
            topics.len()
        )));
    }
    for (position, values) in topics.iter().enumerate() {
        if values.is_empty() {
            continue;
        }
        parsed[position] = Some(values.iter().map(|t| parse_topic(t)).collect::<Result<_, _>>()?);
    }
    Ok(parsed)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

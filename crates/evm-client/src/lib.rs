//! EVM chain access layer for the Relic indexing framework.
//!
//! This crate provides the [`ChainClient`] trait — the two RPC operations the
//! sync engines need (`eth_getLogs` and `eth_getBlockByNumber` with full
//! transactions) — together with:
//!
//! - [`AlloyChainClient`], the production implementation over any alloy
//!   [`Provider`](alloy::providers::Provider)
//! - [`split::get_logs_in_range`], a resilient `eth_getLogs` wrapper that
//!   recognises provider-specific range/size errors and transparently splits
//!   and retries until every sub-window succeeds
//! - [`MockChainClient`], a programmable in-memory client for tests
//!
//! # Crate Relationships
//!
//! This is the **low-level crate** in the Relic stack:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Service Layer (relic-sync)                              │
//! │  └─ task workers drive ChainClient via get_logs_in_range │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  Chain Access (evm-client) ◄── YOU ARE HERE              │
//! │  └─ trait + alloy adapter + splitting + mock             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Why Crate-Owned Types?
//!
//! [`Log`], [`Block`], and [`Transaction`] are owned by this crate rather than
//! re-exported RPC wire types. The engine and its stores only need a stable
//! handful of fields; the alloy adapter performs the lossy conversion once, at
//! the edge, and everything above it stays independent of wire-type churn.
//!
//! # Quick Start
//!
//! ```ignore
//! use evm_client::{AlloyChainClient, LogFilter, split};
//!
//! let provider = ProviderBuilder::new().connect_http(url);
//! let client = AlloyChainClient::new(provider, "mainnet");
//!
//! let filter = LogFilter::new(18_000_000, 18_001_000).with_address(vec![pool]);
//! let logs = split::get_logs_in_range(&client, &filter).await?;
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod error;
pub mod mock;
pub mod split;
pub mod standard;
pub mod traits;
pub mod types;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

// Primary types - what most users need
pub use error::{ClientError, Result};
pub use mock::MockChainClient;
pub use standard::AlloyChainClient;
pub use traits::ChainClient;
pub use types::{Block, Log, LogFilter, Topics, Transaction};

// ═══════════════════════════════════════════════════════════════════════════════
// CRATE INFO
// ═══════════════════════════════════════════════════════════════════════════════

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

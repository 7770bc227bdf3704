//! Relic Historical Sync
//!
//! The historical synchronization engine of the Relic EVM event indexing
//! framework. One service instance reconstructs, for a single network and a
//! set of user-declared event sources, a complete and correctly ordered
//! local store of on-chain events (logs, their transactions, and their
//! enclosing blocks) over a bounded block range, resuming efficiently from
//! any previously persisted progress.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                       HISTORICAL SYNC CORE                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────────────┐   │
//! │  │   Interval   │  │   Progress   │  │   Priority Task Queue   │   │
//! │  │   Algebra    │─▶│   Trackers   │─▶│   (4 worker kinds)      │   │
//! │  └──────────────┘  └──────────────┘  └───────────┬─────────────┘   │
//! │                                                  │                 │
//! │              ┌───────────────────────────────────┼─────────────┐   │
//! │              ▼                                   ▼             ▼   │
//! │       ┌─────────────┐                  ┌──────────────┐   ┌──────┐ │
//! │       │ ChainClient │                  │  EventStore  │   │Events│ │
//! │       │ (evm-client)│                  │    (port)    │   │ (mpsc)│ │
//! │       └─────────────┘                  └──────────────┘   └──────┘ │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`interval`] - Pure interval algebra over block ranges
//! - [`progress`] - Range and block progress trackers
//! - [`queue`] - Priority work queue with bounded concurrency and retry
//! - [`sync`] - The service: task workers, block-task gate, lifecycle
//! - [`types`] - Event sources, criteria, output events
//! - [`ports`] - The event store port
//! - [`store`] - In-memory event store implementation
//! - [`config`] - Configuration loading and validation
//! - [`metrics`] - Sync progress metrics
//! - [`error`] - Service error type
//!
//! # Getting Started
//!
//! ```ignore
//! use relic_sync::sync::{HistoricalSyncService, NetworkConfig, SyncConfig};
//!
//! let (service, mut events) = HistoricalSyncService::new(config, chain, store)?;
//! service.setup().await?;
//! service.start();
//!
//! while let Some(event) = events.recv().await {
//!     // HistoricalCheckpoint { block_number, block_timestamp } ... SyncComplete
//! }
//! ```

pub mod config;
pub mod error;
pub mod interval;
pub mod metrics;
pub mod ports;
pub mod progress;
pub mod queue;
pub mod store;
pub mod sync;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().starts_with("0."));
    }
}

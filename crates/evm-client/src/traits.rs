//! The chain client trait.
//!
//! [`ChainClient`] is the seam between the sync engines and the node: exactly
//! the two RPC operations historical sync needs. Implementations handle
//! transport details and wire-type conversion while presenting crate-owned
//! types to callers.
//!
//! # Design Philosophy
//!
//! - **Minimal**: only operations that require chain interaction
//! - **Chain-agnostic**: works with any EVM-compatible node
//! - **Testable**: the in-crate [`MockChainClient`](crate::mock::MockChainClient)
//!   implements it without a network

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Block, Log, LogFilter};

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN CLIENT TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to an EVM chain.
///
/// Block numbers are native integers on this interface; hex encoding on the
/// wire is an implementation concern.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch logs matching `filter` over its closed block range.
    ///
    /// This issues a single `eth_getLogs` call. Callers that need resilience
    /// against provider range limits should go through
    /// [`split::get_logs_in_range`](crate::split::get_logs_in_range) instead
    /// of calling this directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is unusable.
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;

    /// Fetch a block by number, including its full transaction list.
    ///
    /// Returns `None` if the node does not know the block.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is unusable.
    async fn get_block_with_txs(&self, number: u64) -> Result<Option<Block>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLANKET IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════════

// Allow Arc<T> to be used as ChainClient
#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for std::sync::Arc<T> {
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        (**self).get_logs(filter).await
    }

    async fn get_block_with_txs(&self, number: u64) -> Result<Option<Block>> {
        (**self).get_block_with_txs(number).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

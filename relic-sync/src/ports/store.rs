//! Event store port.

use alloy::primitives::Address;
use async_trait::async_trait;
use futures::stream::BoxStream;

use evm_client::{Block, Log, Transaction};

use crate::error::Result;
use crate::interval::BlockRange;
use crate::types::{FactoryCriteria, LogFilterCriteria};

/// A finite, restartable sequence of child-address batches. The store
/// chooses the batch size.
pub type AddressBatchStream<'a> = BoxStream<'a, Result<Vec<Address>>>;

/// Port for event persistence.
///
/// The store is the single source of truth for what *cached* means on the
/// next start: interval queries return, in canonical sorted form, exactly the
/// coverage previously committed by the insert operations.
///
/// # Implementation Notes
///
/// Insert operations must be idempotent under the same
/// `(criteria, interval)` — block-task retries may replay them.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Cached coverage for a log filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    async fn log_filter_intervals(
        &self,
        chain_id: u64,
        criteria: &LogFilterCriteria,
    ) -> Result<Vec<BlockRange>>;

    /// Commit one fully-fetched log-filter interval: the logs, the
    /// transactions that emitted them, the enclosing block, and the covered
    /// range.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn insert_log_filter_interval(
        &self,
        chain_id: u64,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        criteria: &LogFilterCriteria,
        interval: BlockRange,
    ) -> Result<()>;

    /// Cached coverage for a factory's secondary (child-contract) filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    async fn factory_log_filter_intervals(
        &self,
        chain_id: u64,
        criteria: &FactoryCriteria,
    ) -> Result<Vec<BlockRange>>;

    /// Record raw child-address discovery logs.
    ///
    /// Runs before the discovery interval is committed so that
    /// factory-log-filter workers can read child addresses even when the
    /// interval commit has not happened yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn insert_factory_child_address_logs(&self, chain_id: u64, logs: &[Log]) -> Result<()>;

    /// Commit one fully-fetched factory-log-filter interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn insert_factory_log_filter_interval(
        &self,
        chain_id: u64,
        criteria: &FactoryCriteria,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        interval: BlockRange,
    ) -> Result<()>;

    /// Stream the factory's known child addresses discovered at or below
    /// `up_to_block`, in discovery order, in store-chosen batches.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    async fn factory_child_addresses(
        &self,
        chain_id: u64,
        criteria: &FactoryCriteria,
        up_to_block: u64,
    ) -> Result<AddressBatchStream<'static>>;
}

//! Task and block-callback types.
//!
//! A [`BlockCallback`] is plain data rather than a closure: it captures by
//! value everything an interval commit needs except the block body, which
//! the block worker injects at invocation. Retries of a block task may
//! re-invoke callbacks; the store's insert operations are idempotent.

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::TxHash;

use evm_client::Log;

use crate::interval::BlockRange;
use crate::types::{FactoryCriteria, FactorySource, LogFilterCriteria, LogFilterSource};

// ═══════════════════════════════════════════════════════════════════════════════
// SYNC TASK
// ═══════════════════════════════════════════════════════════════════════════════

/// A unit of work on the historical sync queue.
#[derive(Debug, Clone)]
pub enum SyncTask {
    /// Fetch logs for a plain log-filter source over a block range.
    LogFilter {
        /// The source being synced.
        source: Arc<LogFilterSource>,
        /// The range to fetch.
        range: BlockRange,
    },

    /// Fetch child-address discovery logs for a factory over a block range.
    FactoryChildAddress {
        /// The factory being synced.
        source: Arc<FactorySource>,
        /// The range to fetch.
        range: BlockRange,
    },

    /// Fetch logs over a factory's known child contracts for a block range.
    FactoryLogFilter {
        /// The factory being synced.
        source: Arc<FactorySource>,
        /// The range to fetch.
        range: BlockRange,
    },

    /// Fetch one block body and commit every interval waiting on it.
    Block {
        /// The block to fetch.
        number: u64,
        /// Commits to run against the block body, in registration order.
        callbacks: Vec<BlockCallback>,
    },
}

impl SyncTask {
    /// Queue priority: lower block ranges run first.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // block numbers stay far below i64::MAX
    pub fn priority(&self) -> i64 {
        match self {
            Self::LogFilter { range, .. }
            | Self::FactoryChildAddress { range, .. }
            | Self::FactoryLogFilter { range, .. } => -(range.start as i64),
            Self::Block { number, .. } => -(*number as i64),
        }
    }

    /// Task kind for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LogFilter { .. } => "log_filter",
            Self::FactoryChildAddress { .. } => "factory_child_address",
            Self::FactoryLogFilter { .. } => "factory_log_filter",
            Self::Block { .. } => "block",
        }
    }

    /// The block range this task touches (a single block for block tasks).
    #[must_use]
    pub fn block_range(&self) -> BlockRange {
        match self {
            Self::LogFilter { range, .. }
            | Self::FactoryChildAddress { range, .. }
            | Self::FactoryLogFilter { range, .. } => *range,
            Self::Block { number, .. } => BlockRange::new(*number, *number),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK CALLBACKS
// ═══════════════════════════════════════════════════════════════════════════════

/// A deferred interval commit, keyed by the block number that closes the
/// interval.
#[derive(Debug, Clone)]
pub enum BlockCallback {
    /// Commits a log-filter interval (also used for factory child-address
    /// discovery coverage).
    LogFilter(LogFilterCallback),
    /// Commits a factory-log-filter interval.
    FactoryLogFilter(FactoryLogFilterCallback),
}

/// Captured data for a log-filter interval commit.
#[derive(Debug, Clone)]
pub struct LogFilterCallback {
    /// Source the interval belongs to (metrics label).
    pub source_name: String,
    /// Chain the interval belongs to.
    pub chain_id: u64,
    /// The criteria under which coverage is cached.
    pub criteria: LogFilterCriteria,
    /// The covered range; its `end` is the block this callback waits on.
    pub interval: BlockRange,
    /// Logs owned by the interval.
    pub logs: Vec<Log>,
    /// Hashes of the transactions that emitted those logs.
    pub transaction_hashes: HashSet<TxHash>,
}

/// Captured data for a factory-log-filter interval commit.
#[derive(Debug, Clone)]
pub struct FactoryLogFilterCallback {
    /// Source the interval belongs to (metrics label).
    pub source_name: String,
    /// Chain the interval belongs to.
    pub chain_id: u64,
    /// The factory criteria under which coverage is cached.
    pub criteria: FactoryCriteria,
    /// The covered range; its `end` is the block this callback waits on.
    pub interval: BlockRange,
    /// Logs owned by the interval.
    pub logs: Vec<Log>,
    /// Hashes of the transactions that emitted those logs.
    pub transaction_hashes: HashSet<TxHash>,
}

impl BlockCallback {
    /// The interval this callback commits.
    #[must_use]
    pub const fn interval(&self) -> BlockRange {
        match self {
            Self::LogFilter(callback) => callback.interval,
            Self::FactoryLogFilter(callback) => callback.interval,
        }
    }

    /// Source name for logging and metrics.
    #[must_use]
    pub fn source_name(&self) -> &str {
        match self {
            Self::LogFilter(callback) => &callback.source_name,
            Self::FactoryLogFilter(callback) => &callback.source_name,
        }
    }

    /// Transaction hashes owned by the interval.
    #[must_use]
    pub const fn transaction_hashes(&self) -> &HashSet<TxHash> {
        match self {
            Self::LogFilter(callback) => &callback.transaction_hashes,
            Self::FactoryLogFilter(callback) => &callback.transaction_hashes,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

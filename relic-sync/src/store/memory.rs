//! In-memory event store.
//!
//! Keeps every committed interval, log, transaction, and block in maps keyed
//! for idempotence: re-inserting the same `(criteria, interval)` leaves the
//! store unchanged, and interval coverage is held in canonical form by
//! unioning on insert. Snapshot accessors expose the full state so tests can
//! compare two runs structurally.

use std::collections::{BTreeMap, HashMap};

use alloy::primitives::{Address, B256, TxHash};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;

use evm_client::{Block, Log, Transaction};

use crate::error::Result;
use crate::interval::{self, BlockRange};
use crate::ports::{AddressBatchStream, EventStore};
use crate::types::{FactoryCriteria, LogFilterCriteria};

/// Default number of child addresses per streamed batch.
const DEFAULT_ADDRESS_BATCH_SIZE: usize = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// COVERAGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything cached under one filter: coverage intervals plus the captured
/// chain data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Coverage {
    /// Canonical covered ranges.
    intervals: Vec<BlockRange>,
    /// Logs keyed by `(block_number, log_index)`.
    logs: BTreeMap<(u64, u64), Log>,
    /// Transactions keyed by hash.
    transactions: BTreeMap<TxHash, Transaction>,
    /// Block hashes keyed by number.
    blocks: BTreeMap<u64, B256>,
}

impl Coverage {
    fn commit(
        &mut self,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        interval: BlockRange,
    ) {
        self.intervals = interval::union(&self.intervals, &[interval]);
        for log in logs {
            self.logs
                .insert((log.block_number, log.log_index), log.clone());
        }
        for transaction in transactions {
            self.transactions
                .insert(transaction.hash, transaction.clone());
        }
        self.blocks.insert(block.number, block.hash);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEMORY EVENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Inner {
    log_filters: HashMap<(u64, LogFilterCriteria), Coverage>,
    factory_filters: HashMap<(u64, FactoryCriteria), Coverage>,
    /// Raw discovery logs keyed by `(chain_id, block_number, log_index)`.
    child_logs: BTreeMap<(u64, u64, u64), Log>,
}

/// [`EventStore`] backed by process memory.
#[derive(Debug)]
pub struct MemoryEventStore {
    batch_size: usize,
    inner: Mutex<Inner>,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventStore {
    /// Create an empty store with the default child-address batch size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_ADDRESS_BATCH_SIZE)
    }

    /// Create an empty store streaming child addresses in batches of
    /// `batch_size`.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    #[must_use]
    pub fn with_batch_size(batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be non-zero");
        Self {
            batch_size,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Cached log-filter coverage, without going through the async port.
    #[must_use]
    pub fn cached_log_filter_intervals(
        &self,
        chain_id: u64,
        criteria: &LogFilterCriteria,
    ) -> Vec<BlockRange> {
        self.inner
            .lock()
            .log_filters
            .get(&(chain_id, criteria.clone()))
            .map(|coverage| coverage.intervals.clone())
            .unwrap_or_default()
    }

    /// Cached factory-log-filter coverage, without going through the async
    /// port.
    #[must_use]
    pub fn cached_factory_log_filter_intervals(
        &self,
        chain_id: u64,
        criteria: &FactoryCriteria,
    ) -> Vec<BlockRange> {
        self.inner
            .lock()
            .factory_filters
            .get(&(chain_id, criteria.clone()))
            .map(|coverage| coverage.intervals.clone())
            .unwrap_or_default()
    }

    /// Number of stored child-address discovery logs.
    #[must_use]
    pub fn child_address_log_count(&self) -> usize {
        self.inner.lock().child_logs.len()
    }

    /// Structural snapshot of the whole store, for run-to-run comparison.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock();
        let coverage_entry = |coverage: &Coverage| CoverageSnapshot {
            intervals: coverage.intervals.clone(),
            log_count: coverage.logs.len(),
            transaction_count: coverage.transactions.len(),
        };
        StoreSnapshot {
            log_filters: inner
                .log_filters
                .iter()
                .map(|((chain_id, criteria), coverage)| {
                    (format!("{chain_id}/{criteria:?}"), coverage_entry(coverage))
                })
                .collect(),
            factory_filters: inner
                .factory_filters
                .iter()
                .map(|((chain_id, criteria), coverage)| {
                    (format!("{chain_id}/{criteria:?}"), coverage_entry(coverage))
                })
                .collect(),
            child_log_count: inner.child_logs.len(),
        }
    }
}

/// Comparable snapshot of one filter's cached state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSnapshot {
    /// Canonical covered ranges.
    pub intervals: Vec<BlockRange>,
    /// Number of distinct cached logs.
    pub log_count: usize,
    /// Number of distinct cached transactions.
    pub transaction_count: usize,
}

/// Comparable snapshot of the whole store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// Log-filter coverage keyed by `chain/criteria`.
    pub log_filters: BTreeMap<String, CoverageSnapshot>,
    /// Factory coverage keyed by `chain/criteria`.
    pub factory_filters: BTreeMap<String, CoverageSnapshot>,
    /// Number of stored discovery logs.
    pub child_log_count: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn log_filter_intervals(
        &self,
        chain_id: u64,
        criteria: &LogFilterCriteria,
    ) -> Result<Vec<BlockRange>> {
        Ok(self.cached_log_filter_intervals(chain_id, criteria))
    }

    async fn insert_log_filter_interval(
        &self,
        chain_id: u64,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        criteria: &LogFilterCriteria,
        interval: BlockRange,
    ) -> Result<()> {
        self.inner
            .lock()
            .log_filters
            .entry((chain_id, criteria.clone()))
            .or_default()
            .commit(block, transactions, logs, interval);
        Ok(())
    }

    async fn factory_log_filter_intervals(
        &self,
        chain_id: u64,
        criteria: &FactoryCriteria,
    ) -> Result<Vec<BlockRange>> {
        Ok(self.cached_factory_log_filter_intervals(chain_id, criteria))
    }

    async fn insert_factory_child_address_logs(
        &self,
        chain_id: u64,
        logs: &[Log],
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        for log in logs {
            inner
                .child_logs
                .insert((chain_id, log.block_number, log.log_index), log.clone());
        }
        Ok(())
    }

    async fn insert_factory_log_filter_interval(
        &self,
        chain_id: u64,
        criteria: &FactoryCriteria,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        interval: BlockRange,
    ) -> Result<()> {
        self.inner
            .lock()
            .factory_filters
            .entry((chain_id, criteria.clone()))
            .or_default()
            .commit(block, transactions, logs, interval);
        Ok(())
    }

    async fn factory_child_addresses(
        &self,
        chain_id: u64,
        criteria: &FactoryCriteria,
        up_to_block: u64,
    ) -> Result<AddressBatchStream<'static>> {
        let inner = self.inner.lock();
        let mut addresses: Vec<Address> = Vec::new();
        for ((log_chain, block_number, _), log) in &inner.child_logs {
            if *log_chain != chain_id
                || *block_number > up_to_block
                || log.address != criteria.address
                || log.topics.first() != Some(&criteria.event_selector)
            {
                continue;
            }
            if let Some(address) = criteria.extract_child_address(log)
                && !addresses.contains(&address)
            {
                addresses.push(address);
            }
        }

        let batches: Vec<Vec<Address>> = addresses
            .chunks(self.batch_size)
            .map(<[Address]>::to_vec)
            .collect();
        Ok(stream::iter(batches.into_iter().map(Ok)).boxed())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

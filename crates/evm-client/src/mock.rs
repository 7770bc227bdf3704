//! Mock chain client for testing.
//!
//! [`MockChainClient`] implements [`ChainClient`] over an in-memory log set,
//! with deterministic block synthesis, scripted failures, and full call
//! recording. It backs both this crate's splitting tests and the end-to-end
//! scenarios in `relic-sync`.
//!
//! # Determinism
//!
//! Block hashes and timestamps are pure functions of the block number, and
//! each synthesized block carries one unrelated filler transaction so that
//! callers filtering a block's transactions by hash can be observed doing so.
//!
//! # Panics
//!
//! Methods panic if internal locks are poisoned. This should only happen if
//! a test panics while holding a lock.

// Allow expect in this module since it's for testing only and we want to panic
// on poisoned locks (indicates a bug in tests).
#![allow(clippy::expect_used)]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use alloy::primitives::{Address, B256, Bytes, TxHash};
use async_trait::async_trait;

use crate::error::{ClientError, Result};
use crate::traits::ChainClient;
use crate::types::{Block, Log, LogFilter, Transaction};

/// Timestamp of the synthetic genesis block.
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Seconds between consecutive synthetic blocks.
const BLOCK_TIME: u64 = 12;

// ═══════════════════════════════════════════════════════════════════════════════
// MOCK CHAIN CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory [`ChainClient`] for tests.
///
/// # Example
///
/// ```
/// use alloy::primitives::Address;
/// use evm_client::{ChainClient, LogFilter, MockChainClient};
///
/// #[tokio::main]
/// async fn main() {
///     let client = MockChainClient::new();
///     let pool = Address::repeat_byte(0xAA);
///     client.add_simple_log(pool, 110, 1);
///
///     let logs = client
///         .get_logs(&LogFilter::new(100, 199).with_address(vec![pool]))
///         .await
///         .unwrap();
///     assert_eq!(logs.len(), 1);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockChainClient {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// All logs on the mock chain.
    logs: Vec<Log>,

    /// Blocks the node claims not to know.
    missing_blocks: HashSet<u64>,

    /// One-shot `get_logs` failures keyed by the exact requested range.
    scripted_log_failures: Vec<(u64, u64, ClientError)>,

    /// Queued `get_block_with_txs` failures per block number (FIFO).
    scripted_block_failures: HashMap<u64, Vec<ClientError>>,

    /// Recorded `get_logs` ranges, in call order.
    get_logs_calls: Vec<(u64, u64)>,

    /// Recorded `get_block_with_txs` numbers, in call order.
    get_block_calls: Vec<u64>,
}

impl MockChainClient {
    /// Create an empty mock chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic hash of a synthetic block.
    #[must_use]
    pub fn block_hash(number: u64) -> B256 {
        let mut bytes = [0x0B_u8; 32];
        bytes[24..32].copy_from_slice(&number.to_be_bytes());
        B256::from(bytes)
    }

    /// Deterministic transaction hash from a block number and a seed.
    #[must_use]
    pub fn transaction_hash(block_number: u64, seed: u8) -> TxHash {
        let mut bytes = [seed; 32];
        bytes[0] = 0x7A;
        bytes[24..32].copy_from_slice(&block_number.to_be_bytes());
        TxHash::from(bytes)
    }

    /// Timestamp of a synthetic block.
    #[must_use]
    pub const fn timestamp_of(number: u64) -> u64 {
        GENESIS_TIMESTAMP + number * BLOCK_TIME
    }

    /// Add a log with explicit topics and data; hashes and indices are
    /// derived from `block_number` and `seed`. Returns the stored log.
    pub fn add_log_at(
        &self,
        address: Address,
        topics: Vec<B256>,
        data: Bytes,
        block_number: u64,
        seed: u8,
    ) -> Log {
        let mut inner = self.inner.write().expect("lock poisoned");
        let log_index = inner
            .logs
            .iter()
            .filter(|log| log.block_number == block_number)
            .count() as u64;
        let log = Log {
            address,
            topics,
            data,
            block_number,
            block_hash: Self::block_hash(block_number),
            transaction_hash: Self::transaction_hash(block_number, seed),
            transaction_index: u64::from(seed),
            log_index,
        };
        inner.logs.push(log.clone());
        log
    }

    /// Add a topic-less log (enough for address-only filters).
    pub fn add_simple_log(&self, address: Address, block_number: u64, seed: u8) -> Log {
        self.add_log_at(address, Vec::new(), Bytes::new(), block_number, seed)
    }

    /// Make the node report `number` as unknown (`get_block_with_txs` →
    /// `Ok(None)`).
    pub fn mark_block_missing(&self, number: u64) {
        self.inner
            .write()
            .expect("lock poisoned")
            .missing_blocks
            .insert(number);
    }

    /// Fail the next `get_logs` call whose range is exactly `[from, to]`.
    pub fn script_get_logs_failure(&self, from: u64, to: u64, error: ClientError) {
        self.inner
            .write()
            .expect("lock poisoned")
            .scripted_log_failures
            .push((from, to, error));
    }

    /// Fail the next `get_block_with_txs(number)` call with `error`;
    /// scripting several errors for one number fails that many calls.
    pub fn script_get_block_failure(&self, number: u64, error: ClientError) {
        self.inner
            .write()
            .expect("lock poisoned")
            .scripted_block_failures
            .entry(number)
            .or_default()
            .push(error);
    }

    /// Ranges passed to `get_logs`, in call order.
    #[must_use]
    pub fn get_logs_calls(&self) -> Vec<(u64, u64)> {
        self.inner.read().expect("lock poisoned").get_logs_calls.clone()
    }

    /// Block numbers passed to `get_block_with_txs`, in call order.
    #[must_use]
    pub fn get_block_calls(&self) -> Vec<u64> {
        self.inner.read().expect("lock poisoned").get_block_calls.clone()
    }

    /// Synthesize the block body for `number` from the stored logs.
    fn build_block(inner: &Inner, number: u64) -> Block {
        let block_hash = Self::block_hash(number);

        // Distinct transactions referenced by logs at this block, in
        // transaction-index order.
        let mut transactions: Vec<Transaction> = Vec::new();
        let mut seen = HashSet::new();
        let mut block_logs: Vec<&Log> = inner
            .logs
            .iter()
            .filter(|log| log.block_number == number)
            .collect();
        block_logs.sort_by_key(|log| log.transaction_index);
        for log in block_logs {
            if seen.insert(log.transaction_hash) {
                transactions.push(Transaction {
                    hash: log.transaction_hash,
                    block_number: number,
                    block_hash,
                    transaction_index: log.transaction_index,
                    from: Address::repeat_byte(0x99),
                    to: Some(log.address),
                });
            }
        }

        // One unrelated transaction per block, so hash filtering is visible.
        transactions.push(Transaction {
            hash: Self::transaction_hash(number, 0xFF),
            block_number: number,
            block_hash,
            transaction_index: 999,
            from: Address::repeat_byte(0x99),
            to: None,
        });

        Block {
            number,
            hash: block_hash,
            parent_hash: Self::block_hash(number.saturating_sub(1)),
            timestamp: Self::timestamp_of(number),
            transactions,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN CLIENT IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner
            .get_logs_calls
            .push((filter.from_block, filter.to_block));

        if let Some(position) = inner
            .scripted_log_failures
            .iter()
            .position(|(from, to, _)| *from == filter.from_block && *to == filter.to_block)
        {
            let (_, _, error) = inner.scripted_log_failures.remove(position);
            return Err(error);
        }

        let mut logs: Vec<Log> = inner
            .logs
            .iter()
            .filter(|log| {
                log.block_number >= filter.from_block
                    && log.block_number <= filter.to_block
                    && filter.matches(log)
            })
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn get_block_with_txs(&self, number: u64) -> Result<Option<Block>> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.get_block_calls.push(number);

        if let Some(queue) = inner.scripted_block_failures.get_mut(&number)
            && !queue.is_empty()
        {
            return Err(queue.remove(0));
        }

        if inner.missing_blocks.contains(&number) {
            return Ok(None);
        }

        Ok(Some(Self::build_block(&inner, number)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

//! Crate-owned chain data types.
//!
//! These are the types the sync engine and its stores speak. Only the alloy
//! adapter in [`crate::standard`] converts between them and RPC wire types;
//! everything above this crate stays independent of wire-type churn.

use alloy::primitives::{Address, B256, Bytes, TxHash};

// ═══════════════════════════════════════════════════════════════════════════════
// LOG FILTER
// ═══════════════════════════════════════════════════════════════════════════════

/// The four topic positions of an `eth_getLogs` filter.
///
/// Each position is either unconstrained (`None`) or an OR-list of accepted
/// values, matching the JSON-RPC filter semantics.
pub type Topics = [Option<Vec<B256>>; 4];

/// Parameters for a single `eth_getLogs` request over a closed block range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Contract addresses to match, or `None` for any address.
    pub address: Option<Vec<Address>>,
    /// Topic constraints by position.
    pub topics: Topics,
    /// First block of the range (inclusive).
    pub from_block: u64,
    /// Last block of the range (inclusive).
    pub to_block: u64,
}

impl LogFilter {
    /// Create a filter over `[from_block, to_block]` with no address or topic
    /// constraints.
    #[must_use]
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            ..Self::default()
        }
    }

    /// Constrain the filter to a set of contract addresses.
    #[must_use]
    pub fn with_address(mut self, address: Vec<Address>) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the full topic constraint array.
    #[must_use]
    pub fn with_topics(mut self, topics: Topics) -> Self {
        self.topics = topics;
        self
    }

    /// Constrain topic position 0 to a single event signature.
    #[must_use]
    pub fn with_event_signature(mut self, signature: B256) -> Self {
        self.topics[0] = Some(vec![signature]);
        self
    }

    /// The same filter over a different block range.
    #[must_use]
    pub fn with_range(&self, from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            ..self.clone()
        }
    }

    /// Number of blocks covered by the range.
    #[must_use]
    pub const fn block_count(&self) -> u64 {
        self.to_block - self.from_block + 1
    }

    /// Whether a log's address and topics match this filter.
    ///
    /// Block range is checked separately by callers that already bucket logs.
    #[must_use]
    pub fn matches(&self, log: &Log) -> bool {
        if let Some(addresses) = &self.address
            && !addresses.contains(&log.address)
        {
            return false;
        }
        for (position, constraint) in self.topics.iter().enumerate() {
            if let Some(accepted) = constraint {
                match log.topics.get(position) {
                    Some(topic) if accepted.contains(topic) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// An emitted event log with its chain position.
///
/// Unlike the RPC wire type, position fields are mandatory: the historical
/// engine only ever sees mined logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    /// Contract that emitted the log.
    pub address: Address,
    /// Indexed topics (0 to 4 entries; position 0 is the event signature).
    pub topics: Vec<B256>,
    /// Non-indexed data section.
    pub data: Bytes,
    /// Block containing the log.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: B256,
    /// Transaction that emitted the log.
    pub transaction_hash: TxHash,
    /// Index of that transaction within the block.
    pub transaction_index: u64,
    /// Index of the log within the block.
    pub log_index: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK & TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A mined block with its full transaction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
    /// Transactions in block order.
    pub transactions: Vec<Transaction>,
}

/// A mined transaction, reduced to the fields the event store persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: TxHash,
    /// Block containing the transaction.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: B256,
    /// Index within the block.
    pub transaction_index: u64,
    /// Sender address.
    pub from: Address,
    /// Recipient address, `None` for contract creation.
    pub to: Option<Address>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn log_at(address: Address, topics: Vec<B256>) -> Log {
        Log {
            address,
            topics,
            data: Bytes::new(),
            block_number: 1,
            block_hash: B256::repeat_byte(0x01),
            transaction_hash: TxHash::repeat_byte(0x02),
            transaction_index: 0,
            log_index: 0,
        }
    }

    #[test]
    fn filter_block_count() {
        assert_eq!(LogFilter::new(100, 199).block_count(), 100);
        assert_eq!(LogFilter::new(5, 5).block_count(), 1);
    }

    #[test]
    fn filter_with_range_keeps_criteria() {
        let address = Address::repeat_byte(0xAA);
        let filter = LogFilter::new(0, 9).with_address(vec![address]);
        let narrowed = filter.with_range(5, 9);
        assert_eq!(narrowed.from_block, 5);
        assert_eq!(narrowed.address, Some(vec![address]));
    }

    #[test]
    fn matches_address_constraint() {
        let address = Address::repeat_byte(0xAA);
        let filter = LogFilter::new(0, 10).with_address(vec![address]);

        assert!(filter.matches(&log_at(address, vec![])));
        assert!(!filter.matches(&log_at(Address::repeat_byte(0xBB), vec![])));
    }

    #[test]
    fn matches_topic_constraints() {
        let signature = B256::repeat_byte(0x11);
        let filter = LogFilter::new(0, 10).with_event_signature(signature);

        assert!(filter.matches(&log_at(Address::ZERO, vec![signature])));
        // Wrong signature
        assert!(!filter.matches(&log_at(Address::ZERO, vec![B256::repeat_byte(0x22)])));
        // Missing topic entirely
        assert!(!filter.matches(&log_at(Address::ZERO, vec![])));
    }

    #[test]
    fn unconstrained_filter_matches_everything() {
        let filter = LogFilter::new(0, 10);
        assert!(filter.matches(&log_at(Address::repeat_byte(0x42), vec![])));
    }
}

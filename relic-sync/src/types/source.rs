//! Event source declarations.
//!
//! An event source tells the engine what to sync on one network. Two kinds
//! exist:
//!
//! - **Log filter**: a plain `(address, topics)` filter over a block range.
//! - **Factory**: a contract that announces child contracts in its logs.
//!   Child addresses are discovered from logs on the factory address matching
//!   an event selector, then a secondary log filter runs over the children.
//!
//! Source names must be unique per network; the service validates this at
//! construction.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256};
use thiserror::Error;

use evm_client::{Log, LogFilter, Topics};

// ═══════════════════════════════════════════════════════════════════════════════
// CRITERIA
// ═══════════════════════════════════════════════════════════════════════════════

/// The `(address, topics)` pair handed to `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogFilterCriteria {
    /// Contract addresses to match, or `None` for any address.
    pub address: Option<Vec<Address>>,
    /// Topic constraints by position.
    pub topics: Topics,
}

impl LogFilterCriteria {
    /// Build the RPC filter for these criteria over `[from, to]`.
    #[must_use]
    pub fn to_filter(&self, from: u64, to: u64) -> LogFilter {
        let mut filter = LogFilter::new(from, to).with_topics(self.topics.clone());
        if let Some(address) = &self.address {
            filter = filter.with_address(address.clone());
        }
        filter
    }
}

/// Criteria describing a factory contract and its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactoryCriteria {
    /// The factory contract address.
    pub address: Address,
    /// Event signature of the child-announcement log.
    pub event_selector: B256,
    /// Where in the announcement log the child address lives.
    pub child_address_location: ChildAddressLocation,
    /// Topic constraints for the secondary filter over child contracts.
    pub topics: Topics,
}

impl FactoryCriteria {
    /// Criteria under which child-address discovery logs are fetched and
    /// their coverage is cached: the factory address filtered to the
    /// announcement event.
    #[must_use]
    pub fn child_address_filter(&self) -> LogFilterCriteria {
        LogFilterCriteria {
            address: Some(vec![self.address]),
            topics: [Some(vec![self.event_selector]), None, None, None],
        }
    }

    /// Extract the announced child address from a discovery log.
    ///
    /// Returns `None` if the log does not carry the configured location.
    #[must_use]
    pub fn extract_child_address(&self, log: &Log) -> Option<Address> {
        self.child_address_location.extract(log)
    }

    /// Build the secondary RPC filter over a batch of child contracts.
    #[must_use]
    pub fn to_child_filter(&self, children: Vec<Address>, from: u64, to: u64) -> LogFilter {
        LogFilter::new(from, to)
            .with_address(children)
            .with_topics(self.topics.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHILD ADDRESS LOCATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a factory's announcement log carries the child contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildAddressLocation {
    /// In an indexed topic (positions 1 through 3).
    Topic(usize),
    /// At a byte offset into the data section (a 32-byte word whose last 20
    /// bytes are the address).
    Offset(usize),
}

impl ChildAddressLocation {
    /// Extract the address from `log` at this location, if present.
    #[must_use]
    pub fn extract(&self, log: &Log) -> Option<Address> {
        match self {
            Self::Topic(position) => log.topics.get(*position).map(word_to_address),
            Self::Offset(offset) => {
                let word = log.data.get(*offset..*offset + 32)?;
                Some(Address::from_slice(&word[12..32]))
            }
        }
    }
}

fn word_to_address(word: &B256) -> Address {
    Address::from_slice(&word.as_slice()[12..32])
}

/// Error for unparseable child address locations.
#[derive(Debug, Clone, Error)]
#[error("invalid child address location: {0:?} (expected topic1..topic3 or offset<bytes>)")]
pub struct InvalidChildAddressLocation(pub String);

impl FromStr for ChildAddressLocation {
    type Err = InvalidChildAddressLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(position) = s.strip_prefix("topic") {
            return match position.parse::<usize>() {
                Ok(position @ 1..=3) => Ok(Self::Topic(position)),
                _ => Err(InvalidChildAddressLocation(s.into())),
            };
        }
        if let Some(offset) = s.strip_prefix("offset") {
            return offset
                .parse::<usize>()
                .map(Self::Offset)
                .map_err(|_| InvalidChildAddressLocation(s.into()));
        }
        Err(InvalidChildAddressLocation(s.into()))
    }
}

impl fmt::Display for ChildAddressLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(position) => write!(f, "topic{position}"),
            Self::Offset(offset) => write!(f, "offset{offset}"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCES
// ═══════════════════════════════════════════════════════════════════════════════

/// A plain log-filter event source.
#[derive(Debug, Clone)]
pub struct LogFilterSource {
    /// Unique source name on this network.
    pub name: String,
    /// Chain the source lives on.
    pub chain_id: u64,
    /// Filter criteria.
    pub criteria: LogFilterCriteria,
    /// First block to sync.
    pub start_block: u64,
    /// Last block to sync, `None` for "up to the finalized block".
    pub end_block: Option<u64>,
    /// Per-source override of the network's maximum getLogs range.
    pub max_block_range: Option<u64>,
}

/// A factory event source.
#[derive(Debug, Clone)]
pub struct FactorySource {
    /// Unique source name on this network.
    pub name: String,
    /// Chain the source lives on.
    pub chain_id: u64,
    /// Factory criteria.
    pub criteria: FactoryCriteria,
    /// First block to sync.
    pub start_block: u64,
    /// Last block to sync, `None` for "up to the finalized block".
    pub end_block: Option<u64>,
    /// Per-source override of the network's maximum getLogs range.
    pub max_block_range: Option<u64>,
}

/// An event source declaration.
#[derive(Debug, Clone)]
pub enum EventSource {
    /// Plain log filter.
    LogFilter(LogFilterSource),
    /// Factory with child-contract discovery.
    Factory(FactorySource),
}

impl EventSource {
    /// The source name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::LogFilter(source) => &source.name,
            Self::Factory(source) => &source.name,
        }
    }

    /// First block to sync.
    #[must_use]
    pub const fn start_block(&self) -> u64 {
        match self {
            Self::LogFilter(source) => source.start_block,
            Self::Factory(source) => source.start_block,
        }
    }

    /// Configured end block, if bounded.
    #[must_use]
    pub const fn end_block(&self) -> Option<u64> {
        match self {
            Self::LogFilter(source) => source.end_block,
            Self::Factory(source) => source.end_block,
        }
    }

    /// Per-source maximum getLogs range, if overridden.
    #[must_use]
    pub const fn max_block_range(&self) -> Option<u64> {
        match self {
            Self::LogFilter(source) => source.max_block_range,
            Self::Factory(source) => source.max_block_range,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

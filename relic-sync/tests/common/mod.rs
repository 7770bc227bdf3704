//! Shared fixtures for the end-to-end sync tests.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use tokio::sync::mpsc;
use tokio::time::timeout;

use evm_client::{Block, MockChainClient};
use relic_sync::store::MemoryEventStore;
use relic_sync::sync::{HistoricalSyncService, NetworkConfig, SyncConfig};
use relic_sync::types::{
    ChildAddressLocation, EventSource, FactoryCriteria, FactorySource, LogFilterCriteria,
    LogFilterSource, SyncEvent,
};

/// Chain id used throughout the scenarios.
pub const CHAIN_ID: u64 = 1;

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn topic(byte: u8) -> B256 {
    B256::repeat_byte(byte)
}

/// A 32-byte topic word carrying an address in its low 20 bytes.
pub fn padded(address: Address) -> B256 {
    let mut word = [0_u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    B256::from(word)
}

pub fn network(concurrency: usize) -> NetworkConfig {
    NetworkConfig {
        name: "testnet".into(),
        chain_id: CHAIN_ID,
        default_max_block_range: 10_000,
        max_rpc_request_concurrency: concurrency,
    }
}

pub fn log_filter_criteria(address: Address, topic0: Option<B256>) -> LogFilterCriteria {
    LogFilterCriteria {
        address: Some(vec![address]),
        topics: [topic0.map(|t| vec![t]), None, None, None],
    }
}

pub fn log_filter_source(
    name: &str,
    criteria: LogFilterCriteria,
    start_block: u64,
    end_block: Option<u64>,
    max_block_range: Option<u64>,
) -> EventSource {
    EventSource::LogFilter(LogFilterSource {
        name: name.into(),
        chain_id: CHAIN_ID,
        criteria,
        start_block,
        end_block,
        max_block_range,
    })
}

pub fn factory_criteria(factory: Address, event_selector: B256) -> FactoryCriteria {
    FactoryCriteria {
        address: factory,
        event_selector,
        child_address_location: ChildAddressLocation::Topic(1),
        topics: [None, None, None, None],
    }
}

pub fn factory_source(
    name: &str,
    criteria: FactoryCriteria,
    start_block: u64,
    end_block: Option<u64>,
    max_block_range: Option<u64>,
) -> EventSource {
    EventSource::Factory(FactorySource {
        name: name.into(),
        chain_id: CHAIN_ID,
        criteria,
        start_block,
        end_block,
        max_block_range,
    })
}

/// A minimal block body for pre-seeding the store outside the engine.
pub fn seed_block(number: u64) -> Block {
    Block {
        number,
        hash: MockChainClient::block_hash(number),
        parent_hash: MockChainClient::block_hash(number.saturating_sub(1)),
        timestamp: MockChainClient::timestamp_of(number),
        transactions: Vec::new(),
    }
}

/// Construct a service over the given mock chain and store.
pub fn build_service(
    sources: Vec<EventSource>,
    finalized_block: u64,
    concurrency: usize,
    chain: &Arc<MockChainClient>,
    store: &Arc<MemoryEventStore>,
) -> (
    HistoricalSyncService,
    mpsc::UnboundedReceiver<SyncEvent>,
) {
    let chain: Arc<dyn evm_client::ChainClient> = chain.clone();
    let store: Arc<dyn relic_sync::ports::EventStore> = store.clone();
    HistoricalSyncService::new(
        SyncConfig {
            network: network(concurrency),
            finalized_block,
            sources,
        },
        chain,
        store,
    )
    .expect("service construction")
}

/// Run setup + start and collect every event through `SyncComplete`.
pub async fn run_to_complete(
    service: &HistoricalSyncService,
    events: &mut mpsc::UnboundedReceiver<SyncEvent>,
) -> Vec<SyncEvent> {
    service.setup().await.expect("setup");
    service.start();

    let mut collected = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for sync events")
            .expect("event channel closed before SyncComplete");
        let done = event == SyncEvent::SyncComplete;
        collected.push(event);
        if done {
            return collected;
        }
    }
}

/// The `(block_number, block_timestamp)` pairs of every checkpoint event.
pub fn checkpoints(events: &[SyncEvent]) -> Vec<(u64, u64)> {
    events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::HistoricalCheckpoint {
                block_number,
                block_timestamp,
            } => Some((*block_number, *block_timestamp)),
            SyncEvent::SyncComplete => None,
        })
        .collect()
}

/// Checkpoints must be strictly increasing and `SyncComplete` terminal.
pub fn assert_event_stream_well_formed(events: &[SyncEvent]) {
    let numbers: Vec<u64> = checkpoints(events).iter().map(|(n, _)| *n).collect();
    assert!(
        numbers.windows(2).all(|pair| pair[0] < pair[1]),
        "checkpoints regressed: {numbers:?}"
    );
    assert_eq!(
        events.last(),
        Some(&SyncEvent::SyncComplete),
        "SyncComplete must be the final event"
    );
    assert_eq!(
        events
            .iter()
            .filter(|event| **event == SyncEvent::SyncComplete)
            .count(),
        1,
        "SyncComplete must be emitted exactly once"
    );
}

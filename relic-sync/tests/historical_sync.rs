//! End-to-end historical sync scenarios over the mock chain and the
//! in-memory store.

mod common;

use std::sync::Arc;

use alloy::primitives::Bytes;

use common::{
    CHAIN_ID, addr, assert_event_stream_well_formed, build_service, checkpoints,
    factory_criteria, factory_source, log_filter_criteria, log_filter_source, padded,
    run_to_complete, seed_block, topic,
};
use evm_client::{ClientError, MockChainClient};
use relic_sync::interval::BlockRange;
use relic_sync::store::MemoryEventStore;
use relic_sync::types::SyncEvent;

fn range(start: u64, end: u64) -> BlockRange {
    BlockRange::new(start, end)
}

// ═══════════════════════════════════════════════════════════════════════════════
// S1: FRESH CACHE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn fresh_cache_syncs_full_range() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryEventStore::new());
    let pool = addr(0xA0);
    let transfer = topic(0x11);
    chain.add_log_at(pool, vec![transfer], Bytes::new(), 110, 1);
    chain.add_log_at(pool, vec![transfer], Bytes::new(), 160, 2);

    let criteria = log_filter_criteria(pool, Some(transfer));
    let (service, mut events) = build_service(
        vec![log_filter_source("pool", criteria.clone(), 100, Some(199), Some(50))],
        500,
        1,
        &chain,
        &store,
    );
    let events = run_to_complete(&service, &mut events).await;

    // Two log-filter windows, chunked by max_block_range, low range first.
    assert_eq!(chain.get_logs_calls(), vec![(100, 149), (150, 199)]);

    // One block task per interval boundary: the log blocks plus each
    // window's terminal block.
    assert_eq!(chain.get_block_calls(), vec![110, 149, 160, 199]);

    assert_event_stream_well_formed(&events);
    assert_eq!(
        checkpoints(&events).last().copied(),
        Some((199, MockChainClient::timestamp_of(199)))
    );
    assert_eq!(
        store.cached_log_filter_intervals(CHAIN_ID, &criteria),
        vec![range(100, 199)]
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// S2: PARTIAL CACHE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn partial_cache_resumes_from_persisted_intervals() {
    use relic_sync::ports::EventStore;

    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryEventStore::new());
    let pool = addr(0xA0);
    let transfer = topic(0x11);
    chain.add_log_at(pool, vec![transfer], Bytes::new(), 110, 1);
    chain.add_log_at(pool, vec![transfer], Bytes::new(), 160, 2);

    // A previous run already cached [100, 149].
    let criteria = log_filter_criteria(pool, Some(transfer));
    store
        .insert_log_filter_interval(CHAIN_ID, &seed_block(149), &[], &[], &criteria, range(100, 149))
        .await
        .unwrap();

    let (service, mut events) = build_service(
        vec![log_filter_source("pool", criteria.clone(), 100, Some(199), Some(50))],
        500,
        1,
        &chain,
        &store,
    );
    let events = run_to_complete(&service, &mut events).await;

    // Only the uncached window is fetched.
    assert_eq!(chain.get_logs_calls(), vec![(150, 199)]);
    assert_eq!(chain.get_block_calls(), vec![160, 199]);

    assert_event_stream_well_formed(&events);
    assert_eq!(checkpoints(&events).last().map(|(n, _)| *n), Some(199));
    assert_eq!(
        store.cached_log_filter_intervals(CHAIN_ID, &criteria),
        vec![range(100, 199)]
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// S3: FACTORY
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn factory_discovers_children_and_syncs_their_logs() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryEventStore::new());
    let factory = addr(0xF0);
    let created = topic(0x55);
    let first_child = addr(0xC1);
    let second_child = addr(0xC2);

    // Child announcements on the factory.
    chain.add_log_at(factory, vec![created, padded(first_child)], Bytes::new(), 105, 1);
    chain.add_log_at(factory, vec![created, padded(second_child)], Bytes::new(), 180, 2);
    // Logs emitted by the children themselves.
    chain.add_log_at(first_child, vec![topic(0xE1)], Bytes::new(), 120, 3);
    chain.add_log_at(second_child, vec![topic(0xE1)], Bytes::new(), 190, 4);

    let criteria = factory_criteria(factory, created);
    let (service, mut events) = build_service(
        vec![factory_source("pairs", criteria.clone(), 100, Some(199), Some(50))],
        500,
        1,
        &chain,
        &store,
    );
    let events = run_to_complete(&service, &mut events).await;

    // Each child-address window unblocks a factory-log-filter window over
    // the same range.
    assert_eq!(
        chain.get_logs_calls(),
        vec![(100, 149), (100, 149), (150, 199), (150, 199)]
    );

    // Both announcement logs were persisted raw before any interval commit.
    assert_eq!(store.child_address_log_count(), 2);

    // Child-address discovery coverage reaches the end of the range...
    assert_eq!(
        store.cached_log_filter_intervals(CHAIN_ID, &criteria.child_address_filter()),
        vec![range(100, 199)]
    );
    // ...and so does the secondary filter over the children.
    assert_eq!(
        store.cached_factory_log_filter_intervals(CHAIN_ID, &criteria),
        vec![range(100, 199)]
    );

    assert_event_stream_well_formed(&events);
    assert_eq!(
        checkpoints(&events).last().copied(),
        Some((199, MockChainClient::timestamp_of(199)))
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// S4: RANGE-OVERSIZE RETRY
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn oversize_range_splits_on_provider_hint() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryEventStore::new());
    let pool = addr(0xA0);
    chain.script_get_logs_failure(
        0,
        1000,
        ClientError::rpc(
            -32005,
            "Log response size exceeded. this block range should work: [0, 400]",
            None,
        ),
    );

    let criteria = log_filter_criteria(pool, None);
    let (service, mut events) = build_service(
        vec![log_filter_source("pool", criteria.clone(), 0, Some(1000), None)],
        1000,
        1,
        &chain,
        &store,
    );
    let events = run_to_complete(&service, &mut events).await;

    // The failed window plus exactly two downstream sub-calls.
    assert_eq!(chain.get_logs_calls(), vec![(0, 1000), (0, 400), (401, 1000)]);

    // No logs anywhere: the empty range still commits as one interval.
    assert_eq!(chain.get_block_calls(), vec![1000]);
    assert_eq!(
        store.cached_log_filter_intervals(CHAIN_ID, &criteria),
        vec![range(0, 1000)]
    );
    assert_event_stream_well_formed(&events);
}

// ═══════════════════════════════════════════════════════════════════════════════
// S5: SKIP UNFINALIZED
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn source_past_finalized_is_skipped() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryEventStore::new());

    let criteria = log_filter_criteria(addr(0xA0), None);
    let (service, mut events) = build_service(
        vec![log_filter_source("pool", criteria.clone(), 1000, None, None)],
        500,
        1,
        &chain,
        &store,
    );
    let events = run_to_complete(&service, &mut events).await;

    // No RPC traffic at all; terminal events fire straight from start().
    assert!(chain.get_logs_calls().is_empty());
    assert!(chain.get_block_calls().is_empty());
    assert!(
        store
            .cached_log_filter_intervals(CHAIN_ID, &criteria)
            .is_empty()
    );

    assert_eq!(events.len(), 2);
    assert_eq!(checkpoints(&events).first().map(|(n, _)| *n), Some(500));
    assert_eq!(events.last(), Some(&SyncEvent::SyncComplete));
}

// ═══════════════════════════════════════════════════════════════════════════════
// S6: TRANSIENT FAILURE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn transient_block_failure_is_retried() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryEventStore::new());
    let pool = addr(0xA0);
    chain.add_simple_log(pool, 105, 1);
    chain.script_get_block_failure(105, ClientError::Transport("connection reset".into()));

    let criteria = log_filter_criteria(pool, None);
    let (service, mut events) = build_service(
        vec![log_filter_source("pool", criteria.clone(), 100, Some(109), None)],
        500,
        1,
        &chain,
        &store,
    );
    let events = run_to_complete(&service, &mut events).await;

    // Exactly one retry for the failed block, at the same priority, so it
    // still ran before block 109.
    assert_eq!(chain.get_block_calls(), vec![105, 105, 109]);

    assert_event_stream_well_formed(&events);
    let numbers: Vec<u64> = checkpoints(&events).iter().map(|(n, _)| *n).collect();
    assert!(numbers.contains(&105));
    assert_eq!(numbers.last().copied(), Some(109));
    assert_eq!(
        store.cached_log_filter_intervals(CHAIN_ID, &criteria),
        vec![range(100, 109)]
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE IDEMPOTENCE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn second_run_over_synced_store_changes_nothing() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryEventStore::new());
    let pool = addr(0xA0);
    let transfer = topic(0x11);
    chain.add_log_at(pool, vec![transfer], Bytes::new(), 110, 1);
    chain.add_log_at(pool, vec![transfer], Bytes::new(), 160, 2);

    let criteria = log_filter_criteria(pool, Some(transfer));
    let sources = vec![log_filter_source("pool", criteria.clone(), 100, Some(199), Some(50))];

    let (service, mut events) = build_service(sources.clone(), 500, 2, &chain, &store);
    let first_events = run_to_complete(&service, &mut events).await;
    let first_snapshot = store.snapshot();
    let first_final = checkpoints(&first_events).last().map(|(n, _)| *n);

    // A fresh service over the now-fully-cached store.
    let (service, mut events) = build_service(sources, 500, 2, &chain, &store);
    let second_events = run_to_complete(&service, &mut events).await;

    assert_eq!(store.snapshot(), first_snapshot);
    assert_eq!(first_final, Some(199));
    // The rerun needs no chain traffic and reports the same coverage
    // (emission coalesced into the final checkpoint).
    assert_eq!(
        checkpoints(&second_events).last().map(|(n, _)| *n),
        Some(500)
    );
    assert_event_stream_well_formed(&second_events);
}

// ═══════════════════════════════════════════════════════════════════════════════
// MULTIPLE SOURCES
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn sources_with_different_ranges_both_reach_full_coverage() {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryEventStore::new());
    let first = addr(0xA0);
    let second = addr(0xB0);
    chain.add_simple_log(first, 110, 1);
    chain.add_simple_log(second, 230, 2);

    let first_criteria = log_filter_criteria(first, None);
    let second_criteria = log_filter_criteria(second, None);
    let (service, mut events) = build_service(
        vec![
            log_filter_source("first", first_criteria.clone(), 100, Some(199), None),
            log_filter_source("second", second_criteria.clone(), 150, Some(249), None),
        ],
        500,
        1,
        &chain,
        &store,
    );
    let events = run_to_complete(&service, &mut events).await;

    assert_event_stream_well_formed(&events);
    assert_eq!(checkpoints(&events).last().map(|(n, _)| *n), Some(249));
    assert_eq!(
        store.cached_log_filter_intervals(CHAIN_ID, &first_criteria),
        vec![range(100, 199)]
    );
    assert_eq!(
        store.cached_log_filter_intervals(CHAIN_ID, &second_criteria),
        vec![range(150, 249)]
    );
}

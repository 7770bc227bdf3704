//! The historical sync service.
//!
//! One [`HistoricalSyncService`] instance reconstructs, for a single network
//! and a set of event sources, a complete and correctly ordered local store
//! of on-chain events over `[start_block, finalized_block]`, resuming from
//! whatever coverage the store already holds.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     HistoricalSyncService                           │
//! │                                                                     │
//! │  setup: store intervals ──▶ range trackers ──▶ initial tasks        │
//! │                                                                     │
//! │  ┌───────────────┐   priority    ┌─────────────────────────────┐    │
//! │  │   TaskQueue   │──────────────▶│  SyncWorker                 │    │
//! │  └───────────────┘               │  · log-filter               │    │
//! │          ▲                       │  · factory-child-address ───┼──┐ │
//! │          │ block tasks           │  · factory-log-filter    ◀──┼──┘ │
//! │          │                       │  · block                    │    │
//! │  ┌───────┴────────┐  checkpoint  └──────────┬──────────────────┘    │
//! │  │ block-task gate│◀─────────────  trackers │ callbacks             │
//! │  └────────────────┘                         ▼                       │
//! │                                   block-callback table              │
//! └───────────────────────────────┬─────────────────────────────────────┘
//!                                 │ HistoricalCheckpoint / SyncComplete
//!                                 ▼
//!                            sync gateway
//! ```
//!
//! Log-fetching tasks register *block callbacks* keyed by the block at which
//! an interval commits. Once every range tracker's checkpoint passes a block
//! number, the gate turns its callbacks into a block task; the block task
//! fetches the block body, commits the captured intervals, and advances the
//! block tracker, whose checkpoint is emitted downstream.

mod service;
mod task;
mod worker;

pub use service::{HistoricalSyncService, NetworkConfig, SyncConfig};
pub use task::{BlockCallback, SyncTask};

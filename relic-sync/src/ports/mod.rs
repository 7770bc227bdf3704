//! Port traits consumed by the sync service.
//!
//! The engine's two external collaborators are the chain (the
//! [`ChainClient`](evm_client::ChainClient) trait from `evm-client`) and the
//! event store ([`EventStore`], defined here). Infrastructure adapters
//! implement these against concrete backends; tests plug in the in-memory
//! implementations.

mod store;

pub use store::{AddressBatchStream, EventStore};

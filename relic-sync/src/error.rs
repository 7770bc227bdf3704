//! Error types for the historical sync service.
//!
//! A single [`SyncError`] covers the service: RPC failures bubble up from
//! the chain access layer, store failures from whatever [`EventStore`]
//! implementation is plugged in, and the rest is configuration and the one
//! domain failure (a block the node should know but does not).
//!
//! [`EventStore`]: crate::ports::EventStore
//!
//! # Error Philosophy
//!
//! Workers never suppress errors; they surface to the queue's error handler,
//! which logs task identity and block range and re-enqueues. Classifiable
//! range-limit errors never reach this type — the splitting layer consumes
//! them.

use thiserror::Error;

use evm_client::ClientError;

/// Type alias for service Results.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the historical sync service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Chain RPC failure.
    #[error("rpc error: {0}")]
    Rpc(#[from] ClientError),

    /// Event store failure.
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The node returned no body for a block the engine expected to exist.
    ///
    /// During historical sync (below the finalized block) this indicates a
    /// misconfigured finality bound; the queue retries it like any other
    /// worker failure.
    #[error("block not found: {number}")]
    BlockNotFound {
        /// The missing block number.
        number: u64,
    },

    /// Invalid service or source configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Wrap a store backend error.
    pub fn store<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Store(Box::new(error))
    }

    /// Whether retrying the same task can plausibly succeed.
    ///
    /// Everything except configuration errors is treated as retryable: RPC
    /// and store failures are transient by assumption, and a missing block
    /// should appear once the node catches up.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

//! Output events of the historical sync service.
//!
//! The service communicates with the sync gateway over a single channel of
//! [`SyncEvent`]s rather than a listener registry: checkpoint events are
//! monotone per instance and [`SyncEvent::SyncComplete`] is terminal, so a
//! plain ordered channel preserves everything a consumer needs.

/// An event emitted by the historical sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Every event-source log below `block_number` is fetched and persisted
    /// together with its transaction and block metadata. Downstream indexers
    /// may process up to this block.
    HistoricalCheckpoint {
        /// Highest fully-persisted block number.
        block_number: u64,
        /// Timestamp of that block (Unix seconds).
        block_timestamp: u64,
    },

    /// The full historical range of every event source is synced. Emitted
    /// once; no further events follow.
    SyncComplete,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_carries_number_and_timestamp() {
        let event = SyncEvent::HistoricalCheckpoint {
            block_number: 199,
            block_timestamp: 1_700_002_388,
        };
        assert!(matches!(
            event,
            SyncEvent::HistoricalCheckpoint {
                block_number: 199,
                ..
            }
        ));
    }
}

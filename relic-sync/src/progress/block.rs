//! Block progress tracker.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK CHECKPOINT
// ═══════════════════════════════════════════════════════════════════════════════

/// A `(number, timestamp)` pair marking the highest block up to which every
/// pending block has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCheckpoint {
    /// Block number of the checkpoint.
    pub block_number: u64,
    /// Timestamp of that block (Unix seconds).
    pub block_timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK TRACKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Tracks pending block numbers against completed `(number, timestamp)` pairs.
///
/// Blocks are registered as pending when their block tasks are enqueued and
/// marked completed when the task finishes. The checkpoint only moves to a
/// number once every pending number at or below it has completed, so it never
/// regresses and its timestamp is always the stored timestamp of the
/// checkpoint block.
///
/// Callers must not re-add a number that has already completed; duplicate
/// pending entries of a not-yet-consumed number are tolerated and resolve
/// against the same stored completion.
#[derive(Debug, Default)]
pub struct BlockTracker {
    /// Pending block numbers (min-heap).
    pending: BinaryHeap<Reverse<u64>>,
    /// Completions not yet consumed by a pending pop.
    completed: HashMap<u64, u64>,
    /// Last emitted checkpoint.
    checkpoint: Option<BlockCheckpoint>,
}

impl BlockTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register blocks that will be completed later.
    pub fn add_pending<I: IntoIterator<Item = u64>>(&mut self, numbers: I) {
        for number in numbers {
            self.pending.push(Reverse(number));
        }
    }

    /// Record `(number, timestamp)` as completed and advance the checkpoint
    /// as far as the pending set allows.
    ///
    /// Returns the new checkpoint only if it advanced in this call.
    pub fn add_completed(&mut self, number: u64, timestamp: u64) -> Option<BlockCheckpoint> {
        self.completed.insert(number, timestamp);

        let mut advanced_to = None;
        while let Some(Reverse(smallest)) = self.pending.peek().copied() {
            let Some(block_timestamp) = self.completed.get(&smallest).copied() else {
                break;
            };
            self.pending.pop();
            advanced_to = Some(BlockCheckpoint {
                block_number: smallest,
                block_timestamp,
            });
        }

        let advanced = match (advanced_to, self.checkpoint) {
            (Some(new), Some(old)) => new.block_number > old.block_number,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if let Some(new) = advanced_to {
            self.checkpoint = Some(new);
        }
        advanced.then_some(advanced_to).flatten()
    }

    /// The current checkpoint, if any pending block has been consumed yet.
    #[must_use]
    pub const fn checkpoint(&self) -> Option<BlockCheckpoint> {
        self.checkpoint
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn no_checkpoint_until_smallest_pending_completes() {
        let mut tracker = BlockTracker::new();
        tracker.add_pending([100, 160]);

        // 160 completes first: 100 still blocks the checkpoint.
        assert_eq!(tracker.add_completed(160, 1600), None);
        assert_eq!(tracker.checkpoint(), None);

        // 100 completes: both pop, checkpoint lands on 160.
        let checkpoint = tracker.add_completed(100, 1000).unwrap();
        assert_eq!(checkpoint.block_number, 160);
        assert_eq!(checkpoint.block_timestamp, 1600);
    }

    #[test]
    fn checkpoint_carries_matching_timestamp() {
        let mut tracker = BlockTracker::new();
        tracker.add_pending([5]);
        let checkpoint = tracker.add_completed(5, 555).unwrap();
        assert_eq!(checkpoint.block_number, 5);
        assert_eq!(checkpoint.block_timestamp, 555);
    }

    #[test]
    fn later_pending_blocks_extend_the_sequence() {
        let mut tracker = BlockTracker::new();
        tracker.add_pending([10, 20]);
        assert_eq!(
            tracker.add_completed(10, 100).unwrap().block_number,
            10
        );

        tracker.add_pending([30]);
        assert_eq!(
            tracker.add_completed(20, 200).unwrap().block_number,
            20
        );
        assert_eq!(
            tracker.add_completed(30, 300).unwrap().block_number,
            30
        );
    }

    #[test]
    fn duplicate_pending_number_does_not_re_advance() {
        let mut tracker = BlockTracker::new();
        tracker.add_pending([7, 7]);
        let checkpoint = tracker.add_completed(7, 70).unwrap();
        assert_eq!(checkpoint.block_number, 7);
        // The second pending entry consumed the same completion; the
        // checkpoint did not advance again.
        assert_eq!(tracker.add_completed(8, 80), None);
    }

    proptest! {
        // The checkpoint never regresses no matter the completion order.
        #[test]
        fn checkpoint_is_monotone(
            order in prop::collection::hash_set(0u64..50, 1..20)
                .prop_map(|set| set.into_iter().collect::<Vec<_>>())
                .prop_shuffle()
        ) {
            let mut tracker = BlockTracker::new();
            tracker.add_pending(order.iter().copied());

            let mut last: Option<u64> = None;
            for number in order {
                if let Some(checkpoint) = tracker.add_completed(number, number * 10) {
                    prop_assert!(last.is_none_or(|previous| checkpoint.block_number > previous));
                    prop_assert_eq!(checkpoint.block_timestamp, checkpoint.block_number * 10);
                    last = Some(checkpoint.block_number);
                }
            }
        }
    }
}

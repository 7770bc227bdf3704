//! Range progress tracker.

use crate::interval::{self, BlockRange};

// ═══════════════════════════════════════════════════════════════════════════════
// CHECKPOINT UPDATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of recording a completed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointUpdate {
    /// Whether the checkpoint advanced in this call.
    pub updated: bool,
    /// Checkpoint before the call.
    pub previous: i64,
    /// Checkpoint after the call.
    pub current: i64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RANGE TRACKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Tracks completion of a target block range.
///
/// The checkpoint is the largest block `B` such that `[target.start, B]` is
/// fully completed, expressed as an `i64` so that "nothing completed yet" is
/// representable as `target.start − 1` even for a target starting at block 0.
/// It is monotonically non-decreasing; the completed set is always held in
/// canonical form.
#[derive(Debug, Clone)]
pub struct RangeTracker {
    /// The range this tracker is responsible for.
    target: BlockRange,
    /// Completed sub-ranges, canonical, clipped to `target`.
    completed: Vec<BlockRange>,
}

impl RangeTracker {
    /// Create a tracker for `target` seeded with already-completed ranges.
    ///
    /// `initial_completed` is clipped to the target; out-of-range coverage is
    /// ignored.
    #[must_use]
    pub fn new(target: BlockRange, initial_completed: &[BlockRange]) -> Self {
        let completed = interval::intersection(&[target], initial_completed);
        Self { target, completed }
    }

    /// The tracked target range.
    #[must_use]
    pub const fn target(&self) -> BlockRange {
        self.target
    }

    /// Record `[range.start, range.end]` as completed.
    ///
    /// The range is intersected with the target before merging, so callers
    /// may pass work that spilled past the target bounds.
    pub fn add_completed(&mut self, range: BlockRange) -> CheckpointUpdate {
        let previous = self.checkpoint();
        let clipped = interval::intersection(&[self.target], &[range]);
        self.completed = interval::union(&self.completed, &clipped);
        let current = self.checkpoint();
        CheckpointUpdate {
            updated: current > previous,
            previous,
            current,
        }
    }

    /// Largest `B` such that `[target.start, B]` is fully completed, or
    /// `target.start − 1` if the target's first block is not yet completed.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // block numbers stay far below i64::MAX
    pub fn checkpoint(&self) -> i64 {
        match self.completed.first() {
            Some(first) if first.start == self.target.start => first.end as i64,
            _ => self.target.start as i64 - 1,
        }
    }

    /// Sub-ranges of the target still to be synced.
    #[must_use]
    pub fn required(&self) -> Vec<BlockRange> {
        interval::difference(&[self.target], &self.completed)
    }

    /// Whether the full target is completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.required().is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

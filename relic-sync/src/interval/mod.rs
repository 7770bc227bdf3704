//! Interval algebra over closed block ranges.
//!
//! Cached chain coverage is represented as a canonical list of
//! [`BlockRange`]s: sorted, non-overlapping, and non-adjacent (adjacent
//! ranges are coalesced, so `[1,3],[4,6]` never appears — it is `[1,6]`).
//! The functions here are pure and total over canonical inputs; [`union`]
//! additionally accepts arbitrary input and always produces canonical output,
//! which makes it the normalization entry point.
//!
//! Malformed ranges (`start > end`) are programmer errors and panic.

use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK RANGE
// ═══════════════════════════════════════════════════════════════════════════════

/// A closed interval `[start, end]` of block numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRange {
    /// First block (inclusive).
    pub start: u64,
    /// Last block (inclusive).
    pub end: u64,
}

impl BlockRange {
    /// Create a range.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start <= end, "invalid block range [{start}, {end}]");
        Self { start, end }
    }

    /// Number of blocks covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A closed interval always covers at least one block.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether `block` lies within the range.
    #[must_use]
    pub const fn contains(&self, block: u64) -> bool {
        self.start <= block && block <= self.end
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SET OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Union of two range lists, coalescing overlaps and adjacencies.
///
/// Inputs need not be canonical; the output always is. `union(a, &[])`
/// therefore canonicalizes `a`.
#[must_use]
pub fn union(a: &[BlockRange], b: &[BlockRange]) -> Vec<BlockRange> {
    let mut ranges: Vec<BlockRange> = a.iter().chain(b).copied().collect();
    ranges.sort_unstable();

    let mut result: Vec<BlockRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match result.last_mut() {
            Some(last) if range.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => result.push(range),
        }
    }
    result
}

/// Blocks of `a` not covered by `b`.
///
/// Both inputs must be canonical; the output is canonical.
#[must_use]
pub fn difference(a: &[BlockRange], b: &[BlockRange]) -> Vec<BlockRange> {
    let mut result = Vec::new();
    let mut i = 0;
    for range in a {
        // Skip subtrahend ranges entirely before this range.
        while i < b.len() && b[i].end < range.start {
            i += 1;
        }
        let mut start = range.start;
        let mut j = i;
        while j < b.len() && b[j].start <= range.end && start <= range.end {
            if b[j].start > start {
                result.push(BlockRange::new(start, b[j].start - 1));
            }
            start = start.max(b[j].end.saturating_add(1));
            j += 1;
        }
        if start <= range.end {
            result.push(BlockRange::new(start, range.end));
        }
    }
    result
}

/// Blocks covered by both `a` and `b`.
///
/// Both inputs must be canonical; the output is canonical.
#[must_use]
pub fn intersection(a: &[BlockRange], b: &[BlockRange]) -> Vec<BlockRange> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if start <= end {
            result.push(BlockRange::new(start, end));
        }
        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

/// Total number of blocks covered by a canonical range list.
#[must_use]
pub fn total_blocks(ranges: &[BlockRange]) -> u64 {
    ranges.iter().map(BlockRange::len).sum()
}

/// Split each range into chunks of at most `max_len` blocks.
///
/// Chunks never merge across the gaps between input ranges.
///
/// # Panics
///
/// Panics if `max_len` is zero.
#[must_use]
pub fn chunks(ranges: &[BlockRange], max_len: u64) -> Vec<BlockRange> {
    assert!(max_len > 0, "chunk size must be non-zero");
    let mut result = Vec::new();
    for range in ranges {
        let mut start = range.start;
        while start <= range.end {
            let end = range.end.min(start + (max_len - 1));
            result.push(BlockRange::new(start, end));
            if end == range.end {
                break;
            }
            start = end + 1;
        }
    }
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

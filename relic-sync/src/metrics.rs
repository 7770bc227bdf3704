//! Sync progress metrics.
//!
//! [`SyncMetrics`] wraps the `metrics` facade with the engine's domain
//! vocabulary. Totals are registered per source at setup; the completed
//! counter moves when intervals commit; the rate and ETA gauges are
//! recomputed from blocks completed since startup (cached blocks do not
//! inflate the throughput estimate).
//!
//! Exported series:
//!
//! | Name | Kind | Labels |
//! |------|------|--------|
//! | `historical_sync_total_blocks` | gauge | network, event_source |
//! | `historical_sync_cached_blocks` | gauge | network, event_source |
//! | `historical_sync_completed_blocks` | counter | network, event_source |
//! | `historical_sync_checkpoint_block` | gauge | network |
//! | `historical_sync_completion_rate` | gauge | network |
//! | `historical_sync_completion_eta_seconds` | gauge | network |
//!
//! (`rpc_request_duration_seconds` is recorded by the chain client.)

use std::time::Instant;

use metrics::{counter, gauge};
use parking_lot::Mutex;

// ═══════════════════════════════════════════════════════════════════════════════
// SYNC METRICS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    /// Blocks across all registered sources.
    total: u64,
    /// Blocks completed, including those cached before startup.
    completed: u64,
    /// Blocks that were already cached at startup.
    initial_cached: u64,
}

/// Metrics recorder for one historical sync service instance.
#[derive(Debug)]
pub struct SyncMetrics {
    network: String,
    started_at: Instant,
    progress: Mutex<Progress>,
}

impl SyncMetrics {
    /// Create a recorder labelled with `network`.
    #[must_use]
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            started_at: Instant::now(),
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Register a source's target size and pre-cached coverage at setup.
    pub fn register_source(&self, source: &str, total_blocks: u64, cached_blocks: u64) {
        #[allow(clippy::cast_precision_loss)]
        {
            gauge!(
                "historical_sync_total_blocks",
                "network" => self.network.clone(),
                "event_source" => source.to_owned()
            )
            .set(total_blocks as f64);
            gauge!(
                "historical_sync_cached_blocks",
                "network" => self.network.clone(),
                "event_source" => source.to_owned()
            )
            .set(cached_blocks as f64);
        }

        let progress = {
            let mut progress = self.progress.lock();
            progress.total += total_blocks;
            progress.completed += cached_blocks;
            progress.initial_cached += cached_blocks;
            *progress
        };
        self.publish_rates(progress);
    }

    /// Record `count` blocks committed for `source`.
    pub fn blocks_completed(&self, source: &str, count: u64) {
        counter!(
            "historical_sync_completed_blocks",
            "network" => self.network.clone(),
            "event_source" => source.to_owned()
        )
        .increment(count);

        let progress = {
            let mut progress = self.progress.lock();
            progress.completed += count;
            *progress
        };
        self.publish_rates(progress);
    }

    /// Record the latest emitted checkpoint block.
    pub fn checkpoint(&self, block_number: u64) {
        #[allow(clippy::cast_precision_loss)]
        gauge!(
            "historical_sync_checkpoint_block",
            "network" => self.network.clone()
        )
        .set(block_number as f64);
    }

    /// Fraction of the total target that is completed, in `[0, 1]`.
    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        Self::rate_of(*self.progress.lock())
    }

    #[allow(clippy::cast_precision_loss)]
    fn rate_of(progress: Progress) -> f64 {
        if progress.total == 0 {
            1.0
        } else {
            progress.completed as f64 / progress.total as f64
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn publish_rates(&self, progress: Progress) {
        gauge!(
            "historical_sync_completion_rate",
            "network" => self.network.clone()
        )
        .set(Self::rate_of(progress));

        // ETA from throughput since startup; cached blocks don't count as
        // throughput.
        let synced = progress.completed.saturating_sub(progress.initial_cached);
        let remaining = progress.total.saturating_sub(progress.completed);
        let eta = if remaining == 0 {
            0.0
        } else if synced == 0 {
            f64::INFINITY
        } else {
            self.started_at.elapsed().as_secs_f64() * remaining as f64 / synced as f64
        };
        gauge!(
            "historical_sync_completion_eta_seconds",
            "network" => self.network.clone()
        )
        .set(eta);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

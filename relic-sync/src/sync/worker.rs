//! Task workers.
//!
//! [`SyncWorker`] implements the queue's [`TaskWorker`] for the four task
//! kinds. All tracker and callback-table mutation happens under the service
//! state lock, which is never held across an `await`; RPC and store I/O run
//! outside it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use futures::future::try_join_all;
use tracing::{debug, error};

use evm_client::{Block, Log, split};

use crate::error::{Result, SyncError};
use crate::interval::{self, BlockRange};
use crate::queue::{TaskQueue, TaskWorker};
use crate::types::{FactorySource, LogFilterSource, SyncEvent};

use super::service::SyncContext;
use super::task::{
    BlockCallback, FactoryLogFilterCallback, LogFilterCallback, SyncTask,
};

// ═══════════════════════════════════════════════════════════════════════════════
// LOG INTERVALS
// ═══════════════════════════════════════════════════════════════════════════════

/// A contiguous slice of a fetched range, owning the logs at its `end` block.
#[derive(Debug, Clone)]
pub(crate) struct LogInterval {
    pub range: BlockRange,
    pub logs: Vec<Log>,
}

/// Partition a fetched range into intervals boundaried by the blocks that
/// contain logs.
///
/// Each block `B` with logs closes the interval `[prev + 1, B]` owning those
/// logs; a terminal empty interval ending at `range.end` is appended when the
/// last log block falls short of it. A range with no logs at all yields one
/// empty interval covering the whole range, so empty stretches still become
/// cached coverage. The first interval always starts at `range.start` and
/// the last always ends at `range.end`.
pub(crate) fn build_log_intervals(range: BlockRange, logs: Vec<Log>) -> Vec<LogInterval> {
    let mut by_block: BTreeMap<u64, Vec<Log>> = BTreeMap::new();
    for log in logs {
        if range.contains(log.block_number) {
            by_block.entry(log.block_number).or_default().push(log);
        }
    }

    let mut intervals = Vec::with_capacity(by_block.len() + 1);
    let mut start = range.start;
    for (block_number, block_logs) in by_block {
        intervals.push(LogInterval {
            range: BlockRange::new(start, block_number),
            logs: block_logs,
        });
        start = block_number + 1;
    }
    if start <= range.end {
        intervals.push(LogInterval {
            range: BlockRange::new(start, range.end),
            logs: Vec::new(),
        });
    }
    intervals
}

impl LogInterval {
    fn transaction_hashes(&self) -> std::collections::HashSet<alloy::primitives::TxHash> {
        self.logs.iter().map(|log| log.transaction_hash).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SYNC WORKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Queue worker over [`SyncTask`]s.
pub(crate) struct SyncWorker {
    ctx: Arc<SyncContext>,
}

impl SyncWorker {
    pub(crate) fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Fetch logs for a plain log-filter source, register its interval
    /// commits, and advance the source tracker.
    async fn log_filter_task(
        &self,
        source: &Arc<LogFilterSource>,
        range: BlockRange,
        queue: &TaskQueue<SyncTask>,
    ) -> Result<()> {
        let filter = source.criteria.to_filter(range.start, range.end);
        let logs = split::get_logs_in_range(self.ctx.chain.as_ref(), &filter).await?;
        debug!(
            source = %source.name,
            from_block = range.start,
            to_block = range.end,
            count = logs.len(),
            "fetched log filter range"
        );

        let intervals = build_log_intervals(range, logs);
        {
            let mut state = self.ctx.state.lock();
            for interval in intervals {
                let callback = BlockCallback::LogFilter(LogFilterCallback {
                    source_name: source.name.clone(),
                    chain_id: source.chain_id,
                    criteria: source.criteria.clone(),
                    interval: interval.range,
                    transaction_hashes: interval.transaction_hashes(),
                    logs: interval.logs,
                });
                state
                    .block_callbacks
                    .entry(interval.range.end)
                    .or_default()
                    .push(callback);
            }
            if let Some(tracker) = state.log_filter_trackers.get_mut(&source.name) {
                tracker.add_completed(range);
            }
        }

        self.ctx.enqueue_block_tasks(queue);
        Ok(())
    }

    /// Fetch a factory's child-address discovery logs, persist them raw,
    /// register discovery-coverage commits, and unblock factory-log-filter
    /// work behind the advanced checkpoint.
    async fn factory_child_address_task(
        &self,
        source: &Arc<FactorySource>,
        range: BlockRange,
        queue: &TaskQueue<SyncTask>,
    ) -> Result<()> {
        let child_criteria = source.criteria.child_address_filter();
        let filter = child_criteria.to_filter(range.start, range.end);
        let logs = split::get_logs_in_range(self.ctx.chain.as_ref(), &filter).await?;
        debug!(
            source = %source.name,
            from_block = range.start,
            to_block = range.end,
            count = logs.len(),
            "fetched factory child address logs"
        );

        // Raw discovery logs land before any interval commit so that
        // factory-log-filter workers can read child addresses immediately.
        self.ctx
            .store
            .insert_factory_child_address_logs(source.chain_id, &logs)
            .await?;

        let intervals = build_log_intervals(range, logs);
        let update = {
            let mut state = self.ctx.state.lock();
            for interval in intervals {
                let callback = BlockCallback::LogFilter(LogFilterCallback {
                    source_name: source.name.clone(),
                    chain_id: source.chain_id,
                    criteria: child_criteria.clone(),
                    interval: interval.range,
                    transaction_hashes: interval.transaction_hashes(),
                    logs: interval.logs,
                });
                state
                    .block_callbacks
                    .entry(interval.range.end)
                    .or_default()
                    .push(callback);
            }
            state
                .factory_child_trackers
                .get_mut(&source.name)
                .map(|tracker| tracker.add_completed(range))
        };

        // Cross-kind unblocking: child addresses are now known through the
        // new checkpoint, so the secondary filter may run there.
        if let Some(update) = update
            && update.updated
        {
            let from = checkpoint_successor(update.previous);
            // `updated` implies `current > previous >= -1`, so `current >= 0`.
            let to = u64::try_from(update.current).unwrap_or_default();
            let max_range = source
                .max_block_range
                .unwrap_or(self.ctx.network.default_max_block_range);
            debug!(
                source = %source.name,
                from_block = from,
                to_block = to,
                "child addresses advanced, enqueueing factory log filter tasks"
            );
            for chunk in interval::chunks(&[BlockRange::new(from, to)], max_range) {
                let task = SyncTask::FactoryLogFilter {
                    source: Arc::clone(source),
                    range: chunk,
                };
                let priority = task.priority();
                queue.add_task(task, priority, false);
            }
        }

        self.ctx.enqueue_block_tasks(queue);
        Ok(())
    }

    /// Fetch logs over a factory's known child contracts, register the
    /// interval commits, and advance the factory-log tracker.
    async fn factory_log_filter_task(
        &self,
        source: &Arc<FactorySource>,
        range: BlockRange,
        queue: &TaskQueue<SyncTask>,
    ) -> Result<()> {
        let mut batches = self
            .ctx
            .store
            .factory_child_addresses(source.chain_id, &source.criteria, range.end)
            .await?;

        let mut logs = Vec::new();
        while let Some(batch) = batches.try_next().await? {
            if batch.is_empty() {
                continue;
            }
            let filter = source
                .criteria
                .to_child_filter(batch, range.start, range.end);
            logs.extend(split::get_logs_in_range(self.ctx.chain.as_ref(), &filter).await?);
        }
        // Batches interleave; restore chain order before slicing intervals.
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        debug!(
            source = %source.name,
            from_block = range.start,
            to_block = range.end,
            count = logs.len(),
            "fetched factory log filter range"
        );

        let intervals = build_log_intervals(range, logs);
        {
            let mut state = self.ctx.state.lock();
            for interval in intervals {
                let callback = BlockCallback::FactoryLogFilter(FactoryLogFilterCallback {
                    source_name: source.name.clone(),
                    chain_id: source.chain_id,
                    criteria: source.criteria.clone(),
                    interval: interval.range,
                    transaction_hashes: interval.transaction_hashes(),
                    logs: interval.logs,
                });
                state
                    .block_callbacks
                    .entry(interval.range.end)
                    .or_default()
                    .push(callback);
            }
            if let Some(tracker) = state.factory_log_trackers.get_mut(&source.name) {
                tracker.add_completed(range);
            }
        }

        self.ctx.enqueue_block_tasks(queue);
        Ok(())
    }

    /// Fetch one block body, run every commit waiting on it, and advance the
    /// block tracker.
    async fn block_task(&self, number: u64, callbacks: &[BlockCallback]) -> Result<()> {
        let block = self
            .ctx
            .chain
            .get_block_with_txs(number)
            .await?
            .ok_or(SyncError::BlockNotFound { number })?;

        try_join_all(
            callbacks
                .iter()
                .map(|callback| self.invoke_callback(callback, &block)),
        )
        .await?;

        let checkpoint = self
            .ctx
            .state
            .lock()
            .block_tracker
            .add_completed(number, block.timestamp);
        if let Some(checkpoint) = checkpoint {
            debug!(
                block_number = checkpoint.block_number,
                block_timestamp = checkpoint.block_timestamp,
                "historical checkpoint advanced"
            );
            self.ctx.metrics.checkpoint(checkpoint.block_number);
            self.ctx.emit(SyncEvent::HistoricalCheckpoint {
                block_number: checkpoint.block_number,
                block_timestamp: checkpoint.block_timestamp,
            });
        }
        Ok(())
    }

    /// Commit one interval against the fetched block body.
    ///
    /// Idempotent with respect to the store, so block-task retries may
    /// replay it.
    async fn invoke_callback(&self, callback: &BlockCallback, block: &Block) -> Result<()> {
        let hashes = callback.transaction_hashes();
        let transactions: Vec<_> = block
            .transactions
            .iter()
            .filter(|transaction| hashes.contains(&transaction.hash))
            .cloned()
            .collect();

        match callback {
            BlockCallback::LogFilter(data) => {
                self.ctx
                    .store
                    .insert_log_filter_interval(
                        data.chain_id,
                        block,
                        &transactions,
                        &data.logs,
                        &data.criteria,
                        data.interval,
                    )
                    .await?;
            }
            BlockCallback::FactoryLogFilter(data) => {
                self.ctx
                    .store
                    .insert_factory_log_filter_interval(
                        data.chain_id,
                        &data.criteria,
                        block,
                        &transactions,
                        &data.logs,
                        data.interval,
                    )
                    .await?;
            }
        }

        self.ctx
            .metrics
            .blocks_completed(callback.source_name(), callback.interval().len());
        Ok(())
    }
}

/// First block after an `i64` checkpoint (clamped at genesis).
fn checkpoint_successor(checkpoint: i64) -> u64 {
    u64::try_from(checkpoint + 1).unwrap_or(0)
}

#[async_trait]
impl TaskWorker<SyncTask> for SyncWorker {
    async fn process(&self, task: &SyncTask, queue: &TaskQueue<SyncTask>) -> Result<()> {
        match task {
            SyncTask::LogFilter { source, range } => {
                self.log_filter_task(source, *range, queue).await?;
            }
            SyncTask::FactoryChildAddress { source, range } => {
                self.factory_child_address_task(source, *range, queue).await?;
            }
            SyncTask::FactoryLogFilter { source, range } => {
                self.factory_log_filter_task(source, *range, queue).await?;
            }
            SyncTask::Block { number, callbacks } => {
                self.block_task(*number, callbacks).await?;
            }
        }

        // Completion: nothing queued and this worker is the last one running.
        if queue.is_empty() && queue.pending() <= 1 {
            self.ctx.emit_sync_complete();
        }
        Ok(())
    }

    async fn on_error(&self, error: SyncError, task: SyncTask, queue: &TaskQueue<SyncTask>) {
        error!(
            kind = task.kind(),
            range = %task.block_range(),
            error = %error,
            "sync task failed, re-enqueueing"
        );
        let priority = task.priority();
        queue.add_task(task, priority, true);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

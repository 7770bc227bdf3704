//! Service lifecycle: setup, the block-task gate, completion, shutdown.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use evm_client::ChainClient;

use crate::error::{Result, SyncError};
use crate::interval::{self, BlockRange};
use crate::metrics::SyncMetrics;
use crate::ports::EventStore;
use crate::progress::{BlockTracker, RangeTracker};
use crate::queue::TaskQueue;
use crate::types::{EventSource, FactorySource, LogFilterSource, SyncEvent};

use super::task::{BlockCallback, SyncTask};
use super::worker::SyncWorker;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-network sync parameters.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name (metrics and log label).
    pub name: String,
    /// Chain id.
    pub chain_id: u64,
    /// Maximum `eth_getLogs` range for sources without their own override.
    pub default_max_block_range: u64,
    /// Maximum concurrent task bodies (RPC parallelism).
    pub max_rpc_request_concurrency: usize,
}

/// Everything needed to construct one historical sync service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The network being synced.
    pub network: NetworkConfig,
    /// Upper bound of historical sync; blocks above this belong to the
    /// realtime engine.
    pub finalized_block: u64,
    /// Event sources to sync. Names must be unique.
    pub sources: Vec<EventSource>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Tracker state shared between workers, mutated only under one mutex held
/// for tracker math (never across I/O).
#[derive(Debug, Default)]
pub(crate) struct SyncState {
    /// Per log-filter source progress.
    pub log_filter_trackers: HashMap<String, RangeTracker>,
    /// Per factory source child-address discovery progress.
    pub factory_child_trackers: HashMap<String, RangeTracker>,
    /// Per factory source secondary-filter progress.
    pub factory_log_trackers: HashMap<String, RangeTracker>,
    /// Pending/completed block bookkeeping behind the emitted checkpoint.
    pub block_tracker: BlockTracker,
    /// Deferred interval commits keyed by the block number closing them.
    pub block_callbacks: BTreeMap<u64, Vec<BlockCallback>>,
    /// Highest checkpoint for which block tasks have been enqueued.
    pub block_tasks_enqueued_to: Option<i64>,
    /// Whether `SyncComplete` went out already.
    pub complete_emitted: bool,
    /// Whether the service was killed; suppresses the completion event.
    pub killed: bool,
}

impl SyncState {
    /// Minimum checkpoint across every tracker of every kind, or `None` when
    /// no trackers exist (nothing to sync).
    ///
    /// A tracker that has completed its whole target can never register
    /// another block callback, so it no longer bounds the gate; sources with
    /// shorter ranges would otherwise strand callbacks above their end
    /// block.
    fn min_tracker_checkpoint(&self) -> Option<i64> {
        self.log_filter_trackers
            .values()
            .chain(self.factory_child_trackers.values())
            .chain(self.factory_log_trackers.values())
            .map(|tracker| {
                if tracker.is_complete() {
                    i64::MAX
                } else {
                    tracker.checkpoint()
                }
            })
            .min()
    }
}

/// Shared context handed to workers.
pub(crate) struct SyncContext {
    pub network: NetworkConfig,
    pub finalized_block: u64,
    pub chain: Arc<dyn ChainClient>,
    pub store: Arc<dyn EventStore>,
    pub state: Mutex<SyncState>,
    pub metrics: SyncMetrics,
    events: mpsc::UnboundedSender<SyncEvent>,
}

impl SyncContext {
    /// Send an event to the sync gateway; a dropped receiver is harmless.
    pub(crate) fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            debug!(network = %self.network.name, "sync event receiver dropped");
        }
    }

    /// Emit `SyncComplete` exactly once. A killed service never completes.
    pub(crate) fn emit_sync_complete(&self) {
        let first = {
            let mut state = self.state.lock();
            if state.killed {
                return;
            }
            !std::mem::replace(&mut state.complete_emitted, true)
        };
        if first {
            info!(network = %self.network.name, "historical sync complete");
            self.emit(SyncEvent::SyncComplete);
        }
    }

    /// The block-task gate.
    ///
    /// Computes the minimum checkpoint across every range tracker; if it
    /// advanced past the previous watermark, drains all block callbacks at
    /// or below it into block tasks. By the definition of the checkpoint, no
    /// future log task can register a callback at or below the minimum, so
    /// each drained block's callback list is final.
    pub(crate) fn enqueue_block_tasks(&self, queue: &TaskQueue<SyncTask>) {
        let drained = {
            let mut state = self.state.lock();
            let Some(target) = state.min_tracker_checkpoint() else {
                return;
            };
            if state.block_tasks_enqueued_to.is_some_and(|up_to| target <= up_to) {
                return;
            }
            state.block_tasks_enqueued_to = Some(target);
            let Ok(target) = u64::try_from(target) else {
                // Checkpoint still below genesis; watermark recorded.
                return;
            };

            let keep = state.block_callbacks.split_off(&(target + 1));
            let drained = std::mem::replace(&mut state.block_callbacks, keep);
            state.block_tracker.add_pending(drained.keys().copied());
            drained
        };

        for (number, callbacks) in drained {
            debug!(
                network = %self.network.name,
                block_number = number,
                callbacks = callbacks.len(),
                "enqueueing block task"
            );
            let task = SyncTask::Block { number, callbacks };
            let priority = task.priority();
            queue.add_task(task, priority, false);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HISTORICAL SYNC SERVICE
// ═══════════════════════════════════════════════════════════════════════════════

/// Historical sync service for one `(network, event sources)` pair.
///
/// Construct with [`new`](Self::new), seed with [`setup`](Self::setup), run
/// with [`start`](Self::start). Progress and completion arrive on the event
/// receiver returned by `new`; [`kill`](Self::kill) stops the service,
/// letting in-flight tasks finish.
pub struct HistoricalSyncService {
    ctx: Arc<SyncContext>,
    queue: TaskQueue<SyncTask>,
    sources: Vec<EventSource>,
}

impl std::fmt::Debug for HistoricalSyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoricalSyncService")
            .field("network", &self.ctx.network.name)
            .field("finalized_block", &self.ctx.finalized_block)
            .field("sources", &self.sources.len())
            .finish_non_exhaustive()
    }
}

impl HistoricalSyncService {
    /// Create a service instance and the receiving end of its event channel.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] for duplicate source names or a source
    /// whose start block lies past its configured end block.
    pub fn new(
        config: SyncConfig,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn EventStore>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SyncEvent>)> {
        let mut names = HashSet::new();
        for source in &config.sources {
            if !names.insert(source.name().to_owned()) {
                return Err(SyncError::Config(format!(
                    "duplicate event source name: {}",
                    source.name()
                )));
            }
            if let Some(end_block) = source.end_block()
                && source.start_block() > end_block
            {
                return Err(SyncError::Config(format!(
                    "source {}: start block {} is past end block {end_block}",
                    source.name(),
                    source.start_block()
                )));
            }
        }

        let (events, receiver) = mpsc::unbounded_channel();
        let metrics = SyncMetrics::new(config.network.name.clone());
        let concurrency = config.network.max_rpc_request_concurrency.max(1);
        let ctx = Arc::new(SyncContext {
            network: config.network,
            finalized_block: config.finalized_block,
            chain,
            store,
            state: Mutex::new(SyncState::default()),
            metrics,
            events,
        });
        let worker = SyncWorker::new(Arc::clone(&ctx));
        let queue = TaskQueue::new(Arc::new(worker), concurrency);

        Ok((
            Self {
                ctx,
                queue,
                sources: config.sources,
            },
            receiver,
        ))
    }

    /// Seed trackers from persisted intervals and enqueue the initial tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if reading cached intervals from the store fails.
    pub async fn setup(&self) -> Result<()> {
        for source in &self.sources {
            match source {
                EventSource::LogFilter(source) => self.setup_log_filter(source).await?,
                EventSource::Factory(source) => self.setup_factory(source).await?,
            }
        }
        info!(
            network = %self.ctx.network.name,
            sources = self.sources.len(),
            queued = self.queue.len(),
            finalized_block = self.ctx.finalized_block,
            "historical sync setup complete"
        );
        Ok(())
    }

    /// Start processing. If the queue is already empty (everything cached or
    /// nothing to do), the terminal events are emitted immediately.
    pub fn start(&self) {
        if self.queue.is_empty() && self.queue.pending() == 0 {
            info!(
                network = %self.ctx.network.name,
                "no historical work required, emitting final checkpoint"
            );
            self.ctx.emit(SyncEvent::HistoricalCheckpoint {
                block_number: self.ctx.finalized_block,
                block_timestamp: unix_now(),
            });
            self.ctx.emit_sync_complete();
        }
        self.queue.start();

        // Workers check for completion as they finish, but under parallel
        // threads the last two can each see the other still running. The
        // idle watcher closes that window.
        let queue = self.queue.clone();
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            queue.on_idle().await;
            ctx.emit_sync_complete();
        });
    }

    /// Stop the service: pause the queue and drop queued tasks. In-flight
    /// tasks finish or time out at the RPC layer.
    pub fn kill(&self) {
        self.ctx.state.lock().killed = true;
        self.queue.pause();
        self.queue.clear();
        info!(network = %self.ctx.network.name, "historical sync killed");
    }

    /// Wait until no tasks are queued or running.
    pub async fn wait_idle(&self) {
        self.queue.on_idle().await;
    }

    /// Clamp a source's range to the finalized block. Returns `None` (and
    /// warns) for sources that start past it; realtime sync picks those up.
    fn clamp_target(
        &self,
        name: &str,
        start_block: u64,
        end_block: Option<u64>,
    ) -> Option<BlockRange> {
        let finalized = self.ctx.finalized_block;
        if start_block > finalized {
            warn!(
                source = name,
                start_block,
                finalized_block = finalized,
                "source starts past the finalized block, deferring to realtime sync"
            );
            return None;
        }
        Some(BlockRange::new(
            start_block,
            end_block.unwrap_or(finalized).min(finalized),
        ))
    }

    fn register_metrics(&self, source: &str, target: BlockRange, required: &[BlockRange]) {
        let total = target.len();
        let cached = total - interval::total_blocks(required);
        self.ctx.metrics.register_source(source, total, cached);
    }

    async fn setup_log_filter(&self, source: &LogFilterSource) -> Result<()> {
        let Some(target) = self.clamp_target(&source.name, source.start_block, source.end_block)
        else {
            return Ok(());
        };

        let cached = self
            .ctx
            .store
            .log_filter_intervals(source.chain_id, &source.criteria)
            .await?;
        let tracker = RangeTracker::new(target, &cached);
        let required = tracker.required();
        self.register_metrics(&source.name, target, &required);
        debug!(
            source = %source.name,
            range = %target,
            required = required.len(),
            "seeding log filter source"
        );

        let max_range = source
            .max_block_range
            .unwrap_or(self.ctx.network.default_max_block_range);
        let source = Arc::new(source.clone());
        for chunk in interval::chunks(&required, max_range) {
            let task = SyncTask::LogFilter {
                source: Arc::clone(&source),
                range: chunk,
            };
            let priority = task.priority();
            self.queue.add_task(task, priority, false);
        }

        self.ctx
            .state
            .lock()
            .log_filter_trackers
            .insert(source.name.clone(), tracker);
        Ok(())
    }

    async fn setup_factory(&self, source: &FactorySource) -> Result<()> {
        let Some(target) = self.clamp_target(&source.name, source.start_block, source.end_block)
        else {
            return Ok(());
        };

        // Child-address discovery coverage is cached under the derived
        // log-filter criteria; the secondary filter has its own store.
        let child_cached = self
            .ctx
            .store
            .log_filter_intervals(source.chain_id, &source.criteria.child_address_filter())
            .await?;
        let child_tracker = RangeTracker::new(target, &child_cached);
        let required_child = child_tracker.required();

        let log_cached = self
            .ctx
            .store
            .factory_log_filter_intervals(source.chain_id, &source.criteria)
            .await?;
        let log_tracker = RangeTracker::new(target, &log_cached);
        let required_log = log_tracker.required();

        self.register_metrics(&source.name, target, &required_log);
        debug!(
            source = %source.name,
            range = %target,
            required_child = required_child.len(),
            required_log = required_log.len(),
            "seeding factory source"
        );

        let max_range = source
            .max_block_range
            .unwrap_or(self.ctx.network.default_max_block_range);
        let source = Arc::new(source.clone());
        for chunk in interval::chunks(&required_child, max_range) {
            let task = SyncTask::FactoryChildAddress {
                source: Arc::clone(&source),
                range: chunk,
            };
            let priority = task.priority();
            self.queue.add_task(task, priority, false);
        }

        // Ranges whose child addresses are already cached but whose
        // secondary filter is not can run immediately.
        let ready = interval::difference(&required_log, &required_child);
        for chunk in interval::chunks(&ready, max_range) {
            let task = SyncTask::FactoryLogFilter {
                source: Arc::clone(&source),
                range: chunk,
            };
            let priority = task.priority();
            self.queue.add_task(task, priority, false);
        }

        let mut state = self.ctx.state.lock();
        state
            .factory_child_trackers
            .insert(source.name.clone(), child_tracker);
        state
            .factory_log_trackers
            .insert(source.name.clone(), log_tracker);
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

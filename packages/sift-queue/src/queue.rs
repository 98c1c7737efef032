use crate::config::QueueConfig;
use crate::error::Result;
use crate::task::BackgroundTask;
use crate::types::{
    AddOptions, ProgressRecord, QueueProgress, QueueStats, WorkerStats, WorkerUpdate,
};
use crate::worker::{ProgressSink, Worker};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Background task queue for loading, rendering, et cetera.
///
/// Owns a fixed set of workers: all but the last take interactive tasks
/// (round-robin), the last takes background tasks. Per-worker progress is
/// folded into a single broadcast signal, preferring lower worker indices,
/// so interactive work wins the progress display over background work.
///
/// Cloning is cheap and yields a handle to the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

struct Inner {
    config: QueueConfig,
    workers: Vec<Worker>,
    /// Last status reported by each worker
    last_status: Mutex<Vec<Option<ProgressRecord>>>,
    /// Next interactive slot
    round_robin: AtomicUsize,
    progress_tx: broadcast::Sender<QueueProgress>,
    offload_pool: Option<rayon::ThreadPool>,
}

impl TaskQueue {
    pub fn new(config: QueueConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a queue that also carries a thread pool tasks may use for
    /// CPU-bound work. Routing never touches the pool.
    pub fn with_offload_pool(config: QueueConfig, pool: rayon::ThreadPool) -> Result<Self> {
        Self::build(config, Some(pool))
    }

    fn build(config: QueueConfig, offload_pool: Option<rayon::ThreadPool>) -> Result<Self> {
        config.validate()?;
        let (progress_tx, _) = broadcast::channel(config.notification_capacity);
        let worker_count = config.worker_count;

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let workers = (0..worker_count)
                .map(|id| {
                    let weak = weak.clone();
                    let sink: ProgressSink = Arc::new(move |update: WorkerUpdate| {
                        if let Some(inner) = weak.upgrade() {
                            inner.on_worker_progress(update);
                        }
                    });
                    Worker::new(id, sink)
                })
                .collect();

            Inner {
                last_status: Mutex::new(vec![None; worker_count]),
                round_robin: AtomicUsize::new(0),
                progress_tx,
                offload_pool,
                workers,
                config,
            }
        });

        info!(
            "Task queue created: {} interactive worker(s), 1 background worker",
            inner.config.interactive_slots()
        );
        Ok(Self { inner })
    }

    /// Enqueue a task and return the index of the worker it was routed to.
    ///
    /// Interactive tasks alternate across the interactive workers starting at
    /// 0; everything else goes to the background worker. The pool flags are
    /// accepted but do not change routing.
    pub fn add(&self, task: BackgroundTask, options: AddOptions) -> usize {
        let index = if options.interactive {
            self.next_interactive()
        } else {
            self.inner.config.background_index()
        };

        debug!(
            "Routing task '{}' to worker {} ({}) process_pool={} thread_pool={}",
            task.key,
            index,
            self.inner.config.slot_of(index),
            options.use_process_pool,
            options.use_thread_pool
        );
        self.inner.workers[index].add(task);
        index
    }

    fn next_interactive(&self) -> usize {
        let slots = self.inner.config.interactive_slots();
        self.inner
            .round_robin
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some((n + 1) % slots))
            .unwrap_or_else(|n| n)
    }

    /// Tasks added since each worker last drained, summed over workers.
    pub fn depth(&self) -> usize {
        self.inner.totals().0
    }

    /// Tasks queued but not yet started, summed over workers.
    pub fn remaining(&self) -> usize {
        self.inner.totals().1
    }

    pub fn progress_ratio(&self, current_progress: Option<f64>) -> f64 {
        self.inner.progress_ratio(current_progress)
    }

    /// Subscribe to the aggregated progress signal.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueProgress> {
        self.inner.progress_tx.subscribe()
    }

    pub fn workers(&self) -> &[Worker] {
        &self.inner.workers
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    pub fn offload_pool(&self) -> Option<&rayon::ThreadPool> {
        self.inner.offload_pool.as_ref()
    }

    pub fn stats(&self) -> QueueStats {
        let workers: Vec<WorkerStats> = self
            .inner
            .workers
            .iter()
            .map(|w| {
                let (depth, pending) = w.counts();
                WorkerStats {
                    index: w.id(),
                    slot: self.inner.config.slot_of(w.id()),
                    depth,
                    pending,
                    running: w.is_running(),
                }
            })
            .collect();

        QueueStats {
            depth: workers.iter().map(|w| w.depth).sum(),
            remaining: workers.iter().map(|w| w.pending).sum(),
            running: workers.iter().filter(|w| w.running).count(),
            progress_ratio: self.progress_ratio(None),
            workers,
        }
    }

    /// Block until every worker has drained or `timeout` elapses.
    /// Returns `true` if the whole queue is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.inner.workers.iter().all(|w| {
            let left = deadline.saturating_duration_since(Instant::now());
            w.wait_idle(left)
        })
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("config", &self.inner.config)
            .field("workers", &self.inner.workers)
            .finish()
    }
}

impl Inner {
    fn totals(&self) -> (usize, usize) {
        self.workers
            .iter()
            .map(Worker::counts)
            .fold((0, 0), |(d, r), (depth, pending)| (d + depth, r + pending))
    }

    // depth is only reset when a worker drains, so with several tasks in
    // flight this is "tasks started since last idle" over "tasks added since
    // last idle", not a true completion fraction.
    fn progress_ratio(&self, current_progress: Option<f64>) -> f64 {
        let (depth, remaining) = self.totals();
        match (depth, current_progress) {
            (0, _) => 0.0,
            (1, Some(progress)) => progress,
            _ => depth.saturating_sub(remaining) as f64 / depth as f64,
        }
    }

    fn on_worker_progress(&self, update: WorkerUpdate) {
        // Held across store, scan and send so concurrent workers publish in
        // the order they were aggregated.
        let mut last = self.last_status.lock();
        if let Some(slot) = last.get_mut(update.worker) {
            *slot = update.status;
        }

        let selected = last.iter().enumerate().find_map(|(index, status)| match status {
            Some(record) if self.workers[index].is_running() => Some((index, record.clone())),
            _ => None,
        });

        let progress = match selected {
            Some((worker, record)) => QueueProgress {
                worker: Some(worker),
                ratio: self.progress_ratio(Some(record.progress)),
                record,
            },
            None => QueueProgress {
                worker: None,
                record: ProgressRecord::idle(),
                ratio: self.progress_ratio(None),
            },
        };

        // No subscribers is fine
        let _ = self.progress_tx.send(progress);
    }
}

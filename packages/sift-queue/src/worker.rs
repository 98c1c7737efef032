// Worker - one FIFO of background tasks drained by a dedicated thread
//
// - add() never blocks on execution; it starts the thread if the worker is idle
// - at most one execution thread is live per worker
// - a failing or panicking task is logged and the next queued task runs
// - after draining, depth resets to 0 and a `None` status is emitted

use crate::error::TaskError;
use crate::task::BackgroundTask;
use crate::types::WorkerUpdate;
use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Thread-safe progress callback. Invoked on the worker's own thread.
pub type ProgressSink = Arc<dyn Fn(WorkerUpdate) + Send + Sync>;

#[derive(Default)]
struct WorkerState {
    queue: VecDeque<BackgroundTask>,
    /// Tasks added since the last full drain. Not decremented per task.
    depth: usize,
    running: bool,
}

struct Shared {
    id: usize,
    state: Mutex<WorkerState>,
    idle: Condvar,
    sink: ProgressSink,
}

pub struct Worker {
    shared: Arc<Shared>,
}

impl Worker {
    pub fn new(id: usize, sink: ProgressSink) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                state: Mutex::new(WorkerState::default()),
                idle: Condvar::new(),
                sink,
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// Append a task to the tail of the queue and make sure the worker is running.
    pub fn add(&self, task: BackgroundTask) {
        let id = self.shared.id;
        {
            let mut state = self.shared.state.lock();
            debug!(
                "Worker {} queued task '{}' ({}) [{}]",
                id, task.key, task.description, task.id
            );
            state.queue.push_back(task);
            state.depth += 1;
            if state.running {
                return;
            }
            state.running = true;
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(format!("sift-worker-{}", id))
            .spawn(move || run(shared));

        if let Err(e) = spawned {
            // Tasks stay queued; the next add() retries the spawn.
            error!("Worker {} failed to start thread: {}", id, e);
            self.shared.state.lock().running = false;
            self.shared.idle.notify_all();
        }
    }

    pub fn depth(&self) -> usize {
        self.shared.state.lock().depth
    }

    /// Tasks queued but not yet started.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// `(depth, pending)` read under a single lock.
    pub(crate) fn counts(&self) -> (usize, usize) {
        let state = self.shared.state.lock();
        (state.depth, state.queue.len())
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Block until the worker has drained its queue or `timeout` elapses.
    /// Returns `true` if the worker is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.running {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return !state.running;
            }
        }
        true
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (depth, pending) = self.counts();
        f.debug_struct("Worker")
            .field("id", &self.shared.id)
            .field("depth", &depth)
            .field("pending", &pending)
            .field("running", &self.is_running())
            .finish()
    }
}

fn run(shared: Arc<Shared>) {
    info!("Worker {} started", shared.id);
    loop {
        // The empty check and the depth reset share one guard so an add()
        // landing in between keeps its depth increment.
        let next = {
            let mut state = shared.state.lock();
            let next = state.queue.pop_front();
            if next.is_none() {
                state.depth = 0;
            }
            next
        };
        if let Some(task) = next {
            execute(&shared, task);
            continue;
        }

        (shared.sink)(WorkerUpdate {
            worker: shared.id,
            status: None,
        });

        // Work queued during the idle notification is picked up by this thread.
        let mut state = shared.state.lock();
        if state.queue.is_empty() {
            state.running = false;
            shared.idle.notify_all();
            break;
        }
    }
    info!("Worker {} drained", shared.id);
}

fn execute(shared: &Shared, task: BackgroundTask) {
    let key = task.key.clone();
    let task_id = task.id;
    debug!("Worker {} running task '{}' [{}]", shared.id, key, task_id);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), TaskError> {
        for step in task.into_steps() {
            let record = step?;
            (shared.sink)(WorkerUpdate {
                worker: shared.id,
                status: Some(record),
            });
        }
        Ok(())
    }));

    let result = outcome
        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

    match result {
        Ok(()) => debug!("Worker {} finished task '{}' [{}]", shared.id, key, task_id),
        Err(e) => {
            error!("Background task '{}' failed on worker {}: {}", key, shared.id, e);
            debug!("Background task '{}' [{}] failure: {:?}", key, task_id, e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProgressRecord;
    use std::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn collecting_worker(id: usize) -> (Worker, Arc<Mutex<Vec<WorkerUpdate>>>) {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink_updates = updates.clone();
        let sink: ProgressSink =
            Arc::new(move |u: WorkerUpdate| sink_updates.lock().push(u));
        (Worker::new(id, sink), updates)
    }

    fn ramp(key: &str) -> BackgroundTask {
        let label = key.to_string();
        BackgroundTask::from_records(
            key,
            "ramp",
            (0..=10).map(move |i| ProgressRecord::new(label.clone(), i as f64 / 10.0)),
        )
    }

    fn statuses(updates: &[WorkerUpdate]) -> Vec<Option<f64>> {
        updates
            .iter()
            .map(|u| u.status.as_ref().map(|r| r.progress))
            .collect()
    }

    #[test]
    fn test_runs_task_and_emits_idle() {
        let (worker, updates) = collecting_worker(2);
        worker.add(ramp("a"));
        assert!(worker.wait_idle(TIMEOUT));

        let updates = updates.lock();
        assert_eq!(updates.len(), 12);
        assert!(updates.iter().all(|u| u.worker == 2));
        assert_eq!(updates[0].status.as_ref().unwrap().progress, 0.0);
        assert_eq!(updates[10].status.as_ref().unwrap().progress, 1.0);
        assert!(updates[11].status.is_none());
        assert_eq!(worker.depth(), 0);
        assert_eq!(worker.pending(), 0);
        assert!(!worker.is_running());
    }

    #[test]
    fn test_failure_is_contained_and_next_task_runs() {
        let (worker, updates) = collecting_worker(0);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        worker.add(BackgroundTask::deferred("failing", "fails halfway", move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            vec![
                Ok(ProgressRecord::new("failing", 0.5)),
                Err(TaskError::failed("boom")),
                Ok(ProgressRecord::new("failing", 0.9)),
            ]
        }));
        started_rx.recv_timeout(TIMEOUT).unwrap();
        worker.add(ramp("after"));
        release_tx.send(()).unwrap();
        assert!(worker.wait_idle(TIMEOUT));

        let seen = statuses(&updates.lock());
        let failing: Vec<f64> = updates
            .lock()
            .iter()
            .filter_map(|u| u.status.as_ref())
            .filter(|r| r.activity == "failing")
            .map(|r| r.progress)
            .collect();
        assert_eq!(failing, vec![0.5]);
        assert_eq!(seen[0], Some(0.5));
        // the follow-up ramp ran to completion, then the idle marker
        assert_eq!(seen.len(), 1 + 11 + 1);
        assert_eq!(seen[11], Some(1.0));
        assert_eq!(seen[12], None);
    }

    #[test]
    fn test_panic_is_contained() {
        let (worker, updates) = collecting_worker(1);
        worker.add(BackgroundTask::deferred("panics", "", || -> Vec<crate::task::TaskStep> {
            panic!("render exploded")
        }));
        worker.add(ramp("survivor"));
        assert!(worker.wait_idle(TIMEOUT));

        let seen = statuses(&updates.lock());
        assert_eq!(seen.last(), Some(&None));
        assert!(seen.contains(&Some(1.0)));
    }

    #[test]
    fn test_fifo_order_and_depth_counts() {
        let (worker, updates) = collecting_worker(2);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        worker.add(BackgroundTask::deferred("gate", "", move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            vec![Ok(ProgressRecord::new("gate", 1.0))]
        }));
        started_rx.recv_timeout(TIMEOUT).unwrap();
        worker.add(BackgroundTask::from_records("second", "", vec![ProgressRecord::new("second", 1.0)]));
        worker.add(BackgroundTask::from_records("third", "", vec![ProgressRecord::new("third", 1.0)]));

        assert_eq!(worker.depth(), 3);
        assert_eq!(worker.pending(), 2);
        assert!(worker.is_running());

        release_tx.send(()).unwrap();
        assert!(worker.wait_idle(TIMEOUT));

        let activities: Vec<String> = updates
            .lock()
            .iter()
            .filter_map(|u| u.status.as_ref().map(|r| r.activity.clone()))
            .collect();
        assert_eq!(activities, vec!["gate", "second", "third"]);
        assert_eq!(worker.depth(), 0);
    }

    #[test]
    fn test_restarts_after_drain() {
        let (worker, updates) = collecting_worker(0);
        worker.add(ramp("first"));
        assert!(worker.wait_idle(TIMEOUT));
        worker.add(ramp("second"));
        assert!(worker.wait_idle(TIMEOUT));

        let idle_markers = updates.lock().iter().filter(|u| u.status.is_none()).count();
        assert_eq!(idle_markers, 2);
    }

    #[test]
    fn test_add_during_drain_notification_keeps_depth() {
        let (notified_tx, notified_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();
        let resume_rx = Mutex::new(resume_rx);
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink_updates = updates.clone();
        let sink: ProgressSink = Arc::new(move |u: WorkerUpdate| {
            let drained = u.status.is_none();
            sink_updates.lock().push(u);
            if drained {
                let _ = notified_tx.send(());
                let _ = resume_rx.lock().recv_timeout(TIMEOUT);
            }
        });
        let worker = Worker::new(2, sink);

        worker.add(ramp("first"));
        notified_rx.recv_timeout(TIMEOUT).unwrap();

        // the worker thread is parked inside its drain notification
        worker.add(ramp("late"));
        assert_eq!(worker.depth(), 1);
        assert_eq!(worker.pending(), 1);
        assert!(worker.is_running());

        resume_tx.send(()).unwrap();
        notified_rx.recv_timeout(TIMEOUT).unwrap();
        resume_tx.send(()).unwrap();
        assert!(worker.wait_idle(TIMEOUT));

        let late_done = updates
            .lock()
            .iter()
            .any(|u| u.status == Some(ProgressRecord::new("late", 1.0)));
        assert!(late_done);
        assert_eq!(worker.depth(), 0);
    }

    #[test]
    fn test_wait_idle_on_fresh_worker() {
        let (worker, _) = collecting_worker(0);
        assert!(worker.wait_idle(Duration::from_millis(1)));
    }
}

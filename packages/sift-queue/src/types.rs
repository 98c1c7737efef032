use serde::{Deserialize, Serialize};

/// Current activity and completion ratio of one in-flight task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub activity: String,
    /// 0.0 - 1.0
    pub progress: f64,
}

impl ProgressRecord {
    /// Build a record, clamping `progress` into `[0.0, 1.0]` (NaN becomes 0.0).
    pub fn new(activity: impl Into<String>, progress: f64) -> Self {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        Self {
            activity: activity.into(),
            progress,
        }
    }

    /// The record published once every worker has gone idle.
    pub fn idle() -> Self {
        Self {
            activity: String::new(),
            progress: 0.0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.activity.is_empty() && self.progress == 0.0
    }
}

/// Role of a worker index within the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Slot {
    /// Latency-sensitive, user-triggered work. Holds the position among the
    /// interactive slots.
    Interactive(usize),
    /// Non-urgent work.
    Background,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Interactive(n) => write!(f, "interactive-{}", n),
            Slot::Background => write!(f, "background"),
        }
    }
}

/// Raw report from a single worker. `status` is `None` once the worker's
/// queue has drained.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerUpdate {
    pub worker: usize,
    pub status: Option<ProgressRecord>,
}

/// Aggregated progress signal published to queue subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueProgress {
    /// Worker whose record was selected; `None` for the idle record.
    pub worker: Option<usize>,
    pub record: ProgressRecord,
    /// `progress_ratio` at the moment of publication.
    pub ratio: f64,
}

impl QueueProgress {
    pub fn is_idle(&self) -> bool {
        self.worker.is_none()
    }
}

/// Routing hints accepted by `TaskQueue::add`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    pub interactive: bool,
    /// Reserved; does not affect routing.
    pub use_process_pool: bool,
    /// Reserved; does not affect routing.
    pub use_thread_pool: bool,
}

impl AddOptions {
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    pub fn background() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    pub index: usize,
    pub slot: Slot,
    pub depth: usize,
    pub pending: usize,
    pub running: bool,
}

/// Snapshot of queue state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub workers: Vec<WorkerStats>,
    pub depth: usize,
    pub remaining: usize,
    pub running: usize,
    pub progress_ratio: f64,
}

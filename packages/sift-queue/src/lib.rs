//! Background task queue for loading, rendering, et cetera.
//!
//! A [`TaskQueue`] owns a fixed set of [`Worker`]s, each draining its own FIFO
//! of [`BackgroundTask`]s on a dedicated thread. Tasks are sequences of
//! [`ProgressRecord`]s; the queue folds per-worker progress into a single
//! [`QueueProgress`] broadcast that callers (typically a UI thread) subscribe to.
//!
//! ```no_run
//! use sift_queue::{AddOptions, BackgroundTask, ProgressRecord, QueueConfig, TaskQueue};
//!
//! let queue = TaskQueue::new(QueueConfig::default()).unwrap();
//! let mut progress = queue.subscribe();
//!
//! queue.add(
//!     BackgroundTask::from_records(
//!         "granule-42",
//!         "Load granule",
//!         (0..=10).map(|i| ProgressRecord::new("loading", i as f64 / 10.0)),
//!     ),
//!     AddOptions::interactive(),
//! );
//!
//! while let Ok(event) = progress.blocking_recv() {
//!     if event.is_idle() {
//!         break;
//!     }
//!     println!("{} {:.0}%", event.record.activity, event.ratio * 100.0);
//! }
//! ```

pub mod config;
pub mod error;
pub mod queue;
pub mod task;
pub mod types;
pub mod worker;

pub use config::QueueConfig;
pub use error::{ConfigError, Result, TaskError};
pub use queue::TaskQueue;
pub use task::{BackgroundTask, TaskStep, TaskSteps};
pub use types::*;
pub use worker::{ProgressSink, Worker};

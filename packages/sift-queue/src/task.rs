use crate::error::TaskError;
use crate::types::ProgressRecord;
use uuid::Uuid;

/// One item of a task's progress sequence. `Err` ends the task.
pub type TaskStep = Result<ProgressRecord, TaskError>;

/// Type-erased progress sequence consumed on a worker thread.
pub type TaskSteps = Box<dyn Iterator<Item = TaskStep> + Send>;

enum TaskBody {
    Steps(TaskSteps),
    Deferred(Box<dyn FnOnce() -> TaskSteps + Send>),
}

/// A unit of background work: a producer of progress records.
///
/// `key` is caller-supplied and intended for de-duplication, which is not
/// enforced; queuing the same key twice runs both tasks. `id` is unique per
/// task and only used to correlate log lines.
pub struct BackgroundTask {
    pub id: Uuid,
    pub key: String,
    pub description: String,
    body: TaskBody,
}

impl BackgroundTask {
    /// Wrap an already-built sequence of steps.
    pub fn from_steps<I>(key: impl Into<String>, description: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = TaskStep>,
        I::IntoIter: Send + 'static,
    {
        Self::with_body(key, description, TaskBody::Steps(Box::new(steps.into_iter())))
    }

    /// Wrap a sequence of records that cannot fail.
    pub fn from_records<I>(
        key: impl Into<String>,
        description: impl Into<String>,
        records: I,
    ) -> Self
    where
        I: IntoIterator<Item = ProgressRecord>,
        I::IntoIter: Send + 'static,
    {
        Self::from_steps(key, description, records.into_iter().map(Ok))
    }

    /// Defer building the sequence until a worker picks the task up. `f` runs
    /// on the worker thread.
    pub fn deferred<F, I>(key: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> I + Send + 'static,
        I: IntoIterator<Item = TaskStep>,
        I::IntoIter: Send + 'static,
    {
        let producer = move || -> TaskSteps { Box::new(f().into_iter()) };
        Self::with_body(key, description, TaskBody::Deferred(Box::new(producer)))
    }

    fn with_body(key: impl Into<String>, description: impl Into<String>, body: TaskBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            description: description.into(),
            body,
        }
    }

    pub(crate) fn into_steps(self) -> TaskSteps {
        match self.body {
            TaskBody::Steps(steps) => steps,
            TaskBody::Deferred(producer) => producer(),
        }
    }
}

impl std::fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match self.body {
            TaskBody::Steps(_) => "steps",
            TaskBody::Deferred(_) => "deferred",
        };
        f.debug_struct("BackgroundTask")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("description", &self.description)
            .field("body", &body)
            .finish()
    }
}

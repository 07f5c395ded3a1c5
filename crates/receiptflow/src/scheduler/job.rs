use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::queue::QueueName;

/// Error type returned by a job body.
pub type JobError = Box<dyn std::error::Error + Send + Sync + 'static>;

type JobBody = Box<dyn FnOnce() -> Result<(), JobError> + Send + 'static>;

/// A unit of background work submitted to a queue.
pub struct Job {
    pub id: String,
    /// Short human-readable description used in logs and failure reports.
    pub label: String,
    body: JobBody,
}

impl Job {
    pub fn new<F>(label: impl Into<String>, body: F) -> Self
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            body: Box::new(body),
        }
    }

    pub(crate) fn run(self) -> Result<(), JobError> {
        (self.body)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A job that returned an error or panicked.
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub job_id: String,
    pub label: String,
    pub queue: QueueName,
    pub message: String,
    pub panicked: bool,
}

/// Receives job failures. The scheduler never retries a failed job.
pub trait ErrorSink: Send + Sync {
    fn report(&self, failure: JobFailure);
}

/// Logs failures at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, failure: JobFailure) {
        if failure.panicked {
            log::error!(
                "Job {} ({}) on queue {} panicked: {}",
                failure.job_id,
                failure.label,
                failure.queue,
                failure.message
            );
        } else {
            log::error!(
                "Job {} ({}) on queue {} failed: {}",
                failure.job_id,
                failure.label,
                failure.queue,
                failure.message
            );
        }
    }
}

/// Forwards failures to a channel for the caller to consume.
#[derive(Debug, Clone)]
pub struct ChannelErrorSink {
    sender: Sender<JobFailure>,
}

impl ChannelErrorSink {
    pub fn new() -> (Self, Receiver<JobFailure>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl ErrorSink for ChannelErrorSink {
    fn report(&self, failure: JobFailure) {
        if let Err(e) = self.sender.send(failure) {
            log::warn!("Dropping job failure, receiver gone: {}", e.0.message);
        }
    }
}

/// Extracts a printable message from a `catch_unwind` payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

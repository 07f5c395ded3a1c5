use thiserror::Error;

use super::queue::QueueName;
use crate::settings::SettingsError;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is not running")]
    NotRunning,

    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler is restarting; retry once the restart completes")]
    Restarting,

    #[error("Queue '{0}' has no workers (priority 0 or not configured)")]
    QueueDisabled(QueueName),

    #[error("Queue '{0}' is closed")]
    QueueClosed(QueueName),

    #[error("Task concurrency must be greater than 0")]
    NoConcurrency,

    #[error("Task concurrency {concurrency} is lower than the {active_queues} queues with priority > 0")]
    InsufficientConcurrency {
        concurrency: usize,
        active_queues: usize,
    },

    #[error("Failed to read queue configuration: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

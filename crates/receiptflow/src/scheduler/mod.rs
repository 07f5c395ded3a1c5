pub mod allocation;
pub mod error;
pub mod job;
pub mod polling;
pub mod pool;
pub mod queue;

pub use allocation::{allocate_workers, WorkerAllocation};
pub use error::SchedulerError;
pub use job::{ChannelErrorSink, ErrorSink, Job, JobError, JobFailure, LogErrorSink};
pub use polling::{JobFactory, PollingTrigger};
pub use pool::{DrainReport, TaskScheduler, WorkerState};
pub use queue::{QueueConfiguration, QueueName, SchedulerConfig};

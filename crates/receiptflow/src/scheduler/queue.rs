use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named lane of background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    ReceiptProcessing,
    EmailReceiptProcessing,
    EmailPolling,
    BulkOperations,
    EmailReceiptImageCleanup,
    SystemCleanUp,
}

impl QueueName {
    pub const ALL: [QueueName; 6] = [
        QueueName::ReceiptProcessing,
        QueueName::EmailReceiptProcessing,
        QueueName::EmailPolling,
        QueueName::BulkOperations,
        QueueName::EmailReceiptImageCleanup,
        QueueName::SystemCleanUp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::ReceiptProcessing => "receipt_processing",
            QueueName::EmailReceiptProcessing => "email_receipt_processing",
            QueueName::EmailPolling => "email_polling",
            QueueName::BulkOperations => "bulk_operations",
            QueueName::EmailReceiptImageCleanup => "email_receipt_image_cleanup",
            QueueName::SystemCleanUp => "system_clean_up",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority entry for one queue. Higher priority gets a larger worker share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfiguration {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: QueueName,
    pub priority: i32,
}

impl QueueConfiguration {
    pub fn new(name: QueueName, priority: i32) -> Self {
        Self {
            id: None,
            name,
            priority,
        }
    }
}

/// Snapshot the scheduler reads at start and on every restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub queues: Vec<QueueConfiguration>,
    /// How long a restart waits for in-flight jobs.
    pub grace_period: Duration,
}

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod magic_fill;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod scheduler;
pub mod secrets;
pub mod settings;

pub use ai::{AiAdapter, AiError, AiRegistry, OpenAiCompatibleClient};
pub use config::{load_config, AiVendor, Config, OcrEngine, ProcessingSettings, Prompt, SystemSettings};
pub use db::{Database, DatabaseError, SortDirection, TaskQuery};
pub use error::{ConfigError, ReceiptflowError, Result};
pub use ledger::{LedgerError, SystemTask, SystemTaskStore, TaskLedger, TaskPage, TriggerType};
pub use logging::{init_logging, LogFormat};
pub use magic_fill::{ImageSource, MagicFillError, MagicFillRequest, MagicFillService};
pub use pipeline::{
    ProcessingAttemptMetadata, ProcessingError, ProcessingOutcome, ReceiptProcessor,
    StructuredReceipt,
};
pub use processor::{OcrAdapter, OcrError, OcrRegistry, ReceiptImage};
pub use scheduler::{ErrorSink, Job, QueueName, SchedulerError, TaskScheduler};
pub use secrets::{CredentialCipher, SecretError};
pub use settings::{ConfigSettingsStore, PromptOverrides, SettingsError, SettingsStore};

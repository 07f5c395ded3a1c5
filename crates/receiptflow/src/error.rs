use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReceiptflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Settings error: {0}")]
    Settings(#[from] crate::settings::SettingsError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Processing error: {0}")]
    Processing(#[from] crate::pipeline::ProcessingError),

    #[error("Magic fill error: {0}")]
    MagicFill(#[from] crate::magic_fill::MagicFillError),

    #[error("OCR error: {0}")]
    Ocr(#[from] crate::processor::OcrError),

    #[error("AI error: {0}")]
    Ai(#[from] crate::ai::AiError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] crate::scheduler::SchedulerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Logging error: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid processing settings {id}: {reason}")]
    InvalidProcessingSettings { id: i64, reason: String },

    #[error("Invalid prompt {id}: {reason}")]
    InvalidPrompt { id: i64, reason: String },

    #[error("Invalid system settings: {reason}")]
    InvalidSystemSettings { reason: String },

    #[error("Invalid queue configuration: {reason}")]
    InvalidQueue { reason: String },
}

pub type Result<T> = std::result::Result<T, ReceiptflowError>;

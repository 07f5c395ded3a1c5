use thiserror::Error;

use super::metadata::ProcessingAttemptMetadata;
use super::prompt::CatalogError;

/// Marker that prefixes every structured-result parse failure.
pub const PARSE_ERROR_MARKER: &str = "parse error";

/// Why a single stage of one attempt failed.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("No OCR engine configured for settings {0}")]
    MissingOcrEngine(i64),

    #[error("OCR failed: {0}")]
    Ocr(#[from] crate::processor::OcrError),

    #[error("Prompt rendering failed: {0}")]
    Prompt(#[from] CatalogError),

    #[error("Credential decryption failed: {0}")]
    Credential(#[from] crate::secrets::SecretError),

    #[error("Chat completion failed: {0}")]
    Ai(#[from] crate::ai::AiError),

    #[error("parse error: {0}")]
    Parse(String),
}

impl StageError {
    pub fn is_parse_error(&self) -> bool {
        matches!(self, StageError::Parse(_))
    }
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Nothing ran, so there is nothing to audit.
    #[error("Processing settings unavailable: {0}")]
    Configuration(#[from] crate::settings::SettingsError),

    /// Every configured attempt failed. The metadata still describes each
    /// stage that ran.
    #[error("{}", exhausted_message(.primary_error, .fallback_error.as_ref()))]
    Exhausted {
        metadata: Box<ProcessingAttemptMetadata>,
        primary_error: StageError,
        fallback_error: Option<StageError>,
    },
}

fn exhausted_message(primary: &StageError, fallback: Option<&StageError>) -> String {
    match fallback {
        Some(fallback) => format!(
            "Primary and fallback processing failed (primary: {}; fallback: {})",
            primary, fallback
        ),
        None => format!("Primary processing failed: {}", primary),
    }
}

impl ProcessingError {
    pub fn metadata(&self) -> Option<&ProcessingAttemptMetadata> {
        match self {
            ProcessingError::Exhausted { metadata, .. } => Some(metadata),
            ProcessingError::Configuration(_) => None,
        }
    }

    pub fn into_metadata(self) -> Option<ProcessingAttemptMetadata> {
        match self {
            ProcessingError::Exhausted { metadata, .. } => Some(*metadata),
            ProcessingError::Configuration(_) => None,
        }
    }
}

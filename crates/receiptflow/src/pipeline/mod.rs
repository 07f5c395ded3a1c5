pub mod error;
pub mod metadata;
pub mod prompt;
pub mod receipt;
pub mod runner;

pub use error::{ProcessingError, StageError, PARSE_ERROR_MARKER};
pub use metadata::{
    AttemptKind, AttemptRecord, ProcessingAttemptMetadata, StageDescriptor, TaskStatus, TaskType,
};
pub use prompt::{
    render_prompt, CatalogEntry, CatalogError, PromptVariables, ReceiptCatalog, StaticCatalog,
    DEFAULT_PROMPT,
};
pub use receipt::{clean_response, parse_receipt, EntityRef, StructuredReceipt};
pub use runner::{ProcessingOutcome, ReceiptProcessor};

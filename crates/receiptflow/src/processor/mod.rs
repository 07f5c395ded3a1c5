//! OCR adapters and receipt image handling.
//!
//! Engines are selected by the [`OcrEngine`] stored on a processing settings
//! row. Tesseract is compiled in with the `tesseract` feature; without it a
//! stub is registered that fails every call with [`OcrError::Unavailable`].

pub mod easy_ocr;
pub mod image;
pub mod image_store;

#[cfg(feature = "tesseract")]
pub mod tesseract;

#[cfg(not(feature = "tesseract"))]
pub mod tesseract_stub;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{EngineConfig, OcrEngine};

pub use easy_ocr::EasyOcr;
pub use image::ReceiptImage;
pub use image_store::{FsImageStore, ImageStore, ImageStoreError};

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractOcr;

#[cfg(not(feature = "tesseract"))]
pub use tesseract_stub::TesseractOcr;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("No OCR adapter registered for engine '{}'", .0.as_str())]
    UnsupportedEngine(OcrEngine),

    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("Image is empty")]
    EmptyImage,

    #[error("{engine} timed out after {}s", .timeout.as_secs())]
    Timeout {
        engine: &'static str,
        timeout: Duration,
    },

    #[error("{engine} failed: {message}")]
    Engine {
        engine: &'static str,
        message: String,
    },

    #[error("IO error during OCR: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts text from an image. Empty text is a valid result.
pub trait OcrAdapter: Send + Sync {
    fn extract(&self, image: &ReceiptImage) -> Result<String, OcrError>;
}

/// OCR adapters keyed by engine.
#[derive(Clone, Default)]
pub struct OcrRegistry {
    adapters: HashMap<OcrEngine, Arc<dyn OcrAdapter>>,
}

impl OcrRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the built-in engines with the configured languages and
    /// process timeout.
    pub fn with_defaults(engine: &EngineConfig) -> Self {
        let languages = &engine.ocr_languages;
        let mut registry = Self::new();
        registry.register(OcrEngine::Tesseract, Arc::new(TesseractOcr::new(languages)));
        registry.register(
            OcrEngine::EasyOcr,
            Arc::new(
                EasyOcr::new(languages).with_timeout(Duration::from_secs(engine.ocr_timeout_secs)),
            ),
        );
        registry
    }

    pub fn register(&mut self, engine: OcrEngine, adapter: Arc<dyn OcrAdapter>) {
        self.adapters.insert(engine, adapter);
    }

    pub fn get(&self, engine: OcrEngine) -> Result<Arc<dyn OcrAdapter>, OcrError> {
        self.adapters
            .get(&engine)
            .cloned()
            .ok_or(OcrError::UnsupportedEngine(engine))
    }

    pub fn extract(&self, engine: OcrEngine, image: &ReceiptImage) -> Result<String, OcrError> {
        let _span = tracing::info_span!("processor.ocr", engine = engine.as_str()).entered();
        self.get(engine)?.extract(image)
    }
}

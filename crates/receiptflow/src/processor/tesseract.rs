use std::io::Cursor;

use super::{OcrAdapter, OcrError, ReceiptImage};

const ENGINE: &str = "tesseract";

/// Tesseract via leptess. A fresh `LepTess` instance is created per call
/// since it is not `Sync`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    languages: String,
}

impl TesseractOcr {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };
        Self { languages }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

fn engine_error(message: String) -> OcrError {
    OcrError::Engine {
        engine: ENGINE,
        message,
    }
}

impl OcrAdapter for TesseractOcr {
    fn extract(&self, image: &ReceiptImage) -> Result<String, OcrError> {
        if image.is_empty() {
            return Err(OcrError::EmptyImage);
        }

        let img = image::load_from_memory(&image.bytes)
            .map_err(|e| engine_error(format!("Failed to load image: {}", e)))?;

        // leptess only reads formats Leptonica knows; normalise to PNG.
        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| engine_error(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.languages)
            .map_err(|e| engine_error(format!("Failed to initialize Tesseract: {}", e)))?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| engine_error(format!("Failed to set image: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| engine_error(format!("Text extraction failed: {}", e)))
    }
}

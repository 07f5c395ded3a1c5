//! Tesseract placeholder used when the `tesseract` feature is disabled.
//!
//! Keeps the engine selectable in settings so a misconfigured deployment
//! fails the OCR stage (and falls back) instead of failing to load.

use super::{OcrAdapter, OcrError, ReceiptImage};

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

impl OcrAdapter for TesseractOcr {
    fn extract(&self, image: &ReceiptImage) -> Result<String, OcrError> {
        if image.is_empty() {
            return Err(OcrError::EmptyImage);
        }
        Err(OcrError::Unavailable(
            "tesseract support not compiled in (enable the `tesseract` feature)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_reports_unavailable() {
        let ocr = TesseractOcr::new(&["eng".to_string()]);
        let err = ocr
            .extract(&ReceiptImage::new(vec![1, 2, 3], "image/png"))
            .unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)));
        assert!(err.to_string().contains("tesseract"));
    }
}

//! Isolated environment for end-to-end tests.
//!
//! A `TestHarness` owns a temp directory with an image store and an on-disk
//! ledger database, a settings store built from a `Config`, and scripted OCR
//! and AI adapters that answer from a queue and record what they were asked.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use receiptflow::ai::{AiAdapter, AiError, AiRegistry, CompletionRequest};
use receiptflow::config::{AiVendor, Config, OcrEngine};
use receiptflow::db::Database;
use receiptflow::ledger::TaskLedger;
use receiptflow::magic_fill::MagicFillService;
use receiptflow::pipeline::{CatalogEntry, ReceiptProcessor, StaticCatalog};
use receiptflow::processor::{FsImageStore, OcrAdapter, OcrError, OcrRegistry, ReceiptImage};
use receiptflow::secrets::CredentialCipher;
use receiptflow::settings::ConfigSettingsStore;

/// OCR adapter answering from a queue. An empty queue yields empty text.
#[derive(Default)]
pub struct ScriptedOcr {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<usize>,
}

impl ScriptedOcr {
    pub fn push_text(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_failure(&self, message: &str) {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl OcrAdapter for ScriptedOcr {
    fn extract(&self, _image: &ReceiptImage) -> Result<String, OcrError> {
        *self.calls.lock().unwrap() += 1;
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(OcrError::Engine {
                engine: "scripted",
                message,
            }),
            None => Ok(String::new()),
        }
    }
}

/// What the AI adapter was asked.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub prompt: String,
    pub model: String,
    pub endpoint: Option<String>,
    pub had_image: bool,
    pub credential: Option<String>,
}

#[derive(Default)]
pub struct ScriptedAi {
    replies: Mutex<VecDeque<Result<String, AiError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedAi {
    pub fn push_reply(&self, raw: &str) {
        self.replies.lock().unwrap().push_back(Ok(raw.to_string()));
    }

    pub fn push_error(&self, error: AiError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl AiAdapter for ScriptedAi {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AiError> {
        use secrecy::ExposeSecret;

        self.requests.lock().unwrap().push(RecordedRequest {
            prompt: request.prompt.to_string(),
            model: request.model.to_string(),
            endpoint: request.endpoint.map(str::to_string),
            had_image: request.image.is_some(),
            credential: request.credential.map(|c| c.expose_secret().to_string()),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::Http("no scripted reply".to_string())))
    }
}

pub const TEST_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub struct TestHarness {
    temp_dir: TempDir,
    pub images: FsImageStore,
    pub db: Database,
    pub db_path: PathBuf,
    pub ledger: TaskLedger,
    pub settings: Arc<ConfigSettingsStore>,
    pub ocr: Arc<ScriptedOcr>,
    pub ai: Arc<ScriptedAi>,
    pub cipher: Arc<CredentialCipher>,
    catalog: StaticCatalog,
}

impl TestHarness {
    pub fn new(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let images = FsImageStore::new(temp_dir.path().join("images"));
        let db_path = temp_dir.path().join("data").join("receiptflow.db");
        let db = Database::open(&db_path).expect("Failed to open ledger database");
        let ledger = TaskLedger::new(Arc::new(db.clone()));
        let settings =
            Arc::new(ConfigSettingsStore::from_config(config).expect("Config should be valid"));
        let cipher = Arc::new(CredentialCipher::from_hex_key(TEST_KEY_HEX).expect("valid key"));

        Self {
            temp_dir,
            images,
            db,
            db_path,
            ledger,
            settings,
            ocr: Arc::new(ScriptedOcr::default()),
            ai: Arc::new(ScriptedAi::default()),
            cipher,
            catalog: StaticCatalog::new(
                vec![
                    CatalogEntry::new(1, "Groceries").with_description("Supermarkets"),
                    CatalogEntry::new(2, "Dining"),
                ],
                vec![CatalogEntry::new(10, "Reimbursable")],
            ),
        }
    }

    pub fn temp_path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    pub fn processor(&self) -> ReceiptProcessor {
        let mut ocr = OcrRegistry::new();
        ocr.register(OcrEngine::Tesseract, self.ocr.clone());
        ocr.register(OcrEngine::EasyOcr, self.ocr.clone());

        let mut ai = AiRegistry::new();
        for vendor in [
            AiVendor::OpenAi,
            AiVendor::Gemini,
            AiVendor::OpenAiCustom,
            AiVendor::Ollama,
        ] {
            ai.register(vendor, self.ai.clone());
        }

        ReceiptProcessor::new(
            self.settings.clone(),
            ocr,
            ai,
            Arc::new(self.catalog.clone()),
            Some(self.cipher.clone()),
        )
    }

    pub fn magic_fill(&self) -> Arc<MagicFillService> {
        Arc::new(MagicFillService::new(
            Arc::new(self.processor()),
            self.ledger.clone(),
            Arc::new(self.images.clone()),
        ))
    }

    pub fn receipt_image() -> ReceiptImage {
        ReceiptImage::new(vec![0xff, 0xd8, 0xff, 0xe0], "image/jpeg").with_file_name("receipt.jpg")
    }

    /// Stores an image under `id` and returns it.
    pub fn store_image(&self, id: i64) -> ReceiptImage {
        let image = Self::receipt_image();
        self.images.save(id, &image).expect("Failed to store image");
        image
    }
}

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use secrecy::SecretString;
use tracing::{debug, info_span, warn};

use crate::ai::{AiError, AiRegistry, CompletionRequest};
use crate::processor::{OcrRegistry, ReceiptImage};
use crate::secrets::CredentialCipher;
use crate::settings::{PromptOverrides, ResolvedSettings, SettingsStore};

use super::error::{ProcessingError, StageError};
use super::metadata::{
    AttemptKind, AttemptRecord, ProcessingAttemptMetadata, StageDescriptor, TaskType,
};
use super::prompt::{render_prompt, PromptVariables, ReceiptCatalog};
use super::receipt::{failure_description, parse_receipt, truncate_description, StructuredReceipt};

/// Successful run: the extracted receipt plus the trail that produced it.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub receipt: StructuredReceipt,
    pub metadata: ProcessingAttemptMetadata,
}

/// Runs OCR and AI extraction with the primary settings, then the fallback
/// settings if the primary attempt failed at any stage.
///
/// Each call resolves one settings snapshot and uses it for both attempts.
/// The fallback starts over from its own OCR stage.
pub struct ReceiptProcessor {
    settings: Arc<dyn SettingsStore>,
    ocr: OcrRegistry,
    ai: AiRegistry,
    catalog: Arc<dyn ReceiptCatalog>,
    cipher: Option<Arc<CredentialCipher>>,
}

impl ReceiptProcessor {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        ocr: OcrRegistry,
        ai: AiRegistry,
        catalog: Arc<dyn ReceiptCatalog>,
        cipher: Option<Arc<CredentialCipher>>,
    ) -> Self {
        Self {
            settings,
            ocr,
            ai,
            catalog,
            cipher,
        }
    }

    pub fn process(
        &self,
        image: &ReceiptImage,
        overrides: &PromptOverrides,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let active = self.settings.active_processing_settings_with(overrides)?;

        let _span = info_span!(
            "pipeline",
            primary_settings_id = active.primary.settings.id,
            fallback_settings_id = ?active.fallback.as_ref().map(|f| f.settings.id),
        )
        .entered();

        let (primary, primary_result) = self.run_attempt(AttemptKind::Primary, &active.primary, image);
        let primary_error = match primary_result {
            Ok(receipt) => {
                return Ok(ProcessingOutcome {
                    receipt,
                    metadata: ProcessingAttemptMetadata {
                        primary,
                        fallback: None,
                    },
                })
            }
            Err(e) => e,
        };

        let Some(fallback_settings) = active.fallback.as_ref() else {
            warn!(
                "Primary settings {} failed and no fallback is configured: {}",
                primary.settings_id, primary_error
            );
            return Err(ProcessingError::Exhausted {
                metadata: Box::new(ProcessingAttemptMetadata {
                    primary,
                    fallback: None,
                }),
                primary_error,
                fallback_error: None,
            });
        };

        warn!(
            "Primary settings {} failed, trying fallback {}: {}",
            primary.settings_id, fallback_settings.settings.id, primary_error
        );
        let (fallback, fallback_result) =
            self.run_attempt(AttemptKind::Fallback, fallback_settings, image);
        let metadata = ProcessingAttemptMetadata {
            primary,
            fallback: Some(fallback),
        };

        match fallback_result {
            Ok(receipt) => Ok(ProcessingOutcome { receipt, metadata }),
            Err(fallback_error) => Err(ProcessingError::Exhausted {
                metadata: Box::new(metadata),
                primary_error,
                fallback_error: Some(fallback_error),
            }),
        }
    }

    fn run_attempt(
        &self,
        kind: AttemptKind,
        resolved: &ResolvedSettings,
        image: &ReceiptImage,
    ) -> (AttemptRecord, Result<StructuredReceipt, StageError>) {
        let _span = info_span!(
            "attempt",
            attempt = kind.as_str(),
            settings_id = resolved.settings.id,
        )
        .entered();

        let mut record = AttemptRecord::new(kind, &resolved.settings);
        let result = self.run_stages(&mut record, resolved, image);
        record.succeeded = result.is_ok();
        (record, result)
    }

    fn run_stages(
        &self,
        record: &mut AttemptRecord,
        resolved: &ResolvedSettings,
        image: &ReceiptImage,
    ) -> Result<StructuredReceipt, StageError> {
        let settings = &resolved.settings;

        let ocr_text = if settings.is_vision_model {
            debug!("Vision model {}, skipping OCR", settings.model);
            String::new()
        } else {
            self.stage_ocr(record, resolved, image)?
        };

        let prompt = self.stage_prompt(record, resolved, &ocr_text)?;
        self.stage_chat_completion(record, resolved, &prompt, image)
    }

    fn stage_ocr(
        &self,
        record: &mut AttemptRecord,
        resolved: &ResolvedSettings,
        image: &ReceiptImage,
    ) -> Result<String, StageError> {
        let _span = info_span!("ocr").entered();
        let started = Utc::now();
        let result = match resolved.settings.ocr_engine {
            Some(engine) => self.ocr.extract(engine, image).map_err(StageError::from),
            None => Err(StageError::MissingOcrEngine(resolved.settings.id)),
        };
        let ended = Utc::now();

        match result {
            Ok(text) => {
                if text.trim().is_empty() {
                    debug!("OCR returned no text, passing through");
                }
                record.ocr = Some(StageDescriptor::succeeded(TaskType::Ocr, started, ended, text.clone()));
                Ok(text)
            }
            Err(e) => {
                record.ocr = Some(failed(TaskType::Ocr, started, ended, &e));
                Err(e)
            }
        }
    }

    fn stage_prompt(
        &self,
        record: &mut AttemptRecord,
        resolved: &ResolvedSettings,
        ocr_text: &str,
    ) -> Result<String, StageError> {
        let _span = info_span!("prompt", prompt_id = resolved.prompt.id).entered();
        let started = Utc::now();
        let result = PromptVariables::from_catalog(self.catalog.as_ref(), ocr_text, started.year())
            .map(|vars| render_prompt(&resolved.prompt.prompt, &vars))
            .map_err(StageError::from);
        let ended = Utc::now();

        match result {
            Ok(prompt) => {
                record.prompt = Some(StageDescriptor::succeeded(
                    TaskType::Prompt,
                    started,
                    ended,
                    prompt.clone(),
                ));
                Ok(prompt)
            }
            Err(e) => {
                record.prompt = Some(failed(TaskType::Prompt, started, ended, &e));
                Err(e)
            }
        }
    }

    fn stage_chat_completion(
        &self,
        record: &mut AttemptRecord,
        resolved: &ResolvedSettings,
        prompt: &str,
        image: &ReceiptImage,
    ) -> Result<StructuredReceipt, StageError> {
        let settings = &resolved.settings;
        let _span = info_span!(
            "chat_completion",
            vendor = settings.ai_type.as_str(),
            model = settings.model.as_str(),
        )
        .entered();

        let credential = match self.credential(resolved) {
            Ok(credential) => credential,
            Err(e) => {
                let now = Utc::now();
                record.chat_completion = Some(StageDescriptor::failed(
                    TaskType::ChatCompletion,
                    now,
                    now,
                    failure_description(&e, ""),
                ));
                return Err(e);
            }
        };

        let request = CompletionRequest {
            prompt,
            image: settings.is_vision_model.then_some(image),
            credential: credential.as_ref(),
            model: &settings.model,
            endpoint: settings.url.as_deref(),
        };

        let started = Utc::now();
        let result = self
            .ai
            .get(settings.ai_type)
            .and_then(|adapter| adapter.complete(&request));
        let ended = Utc::now();
        drop(credential);

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                record.raw_response = e.raw_response().unwrap_or_default().to_string();
                let e = StageError::from(e);
                record.chat_completion = Some(StageDescriptor::failed(
                    TaskType::ChatCompletion,
                    started,
                    ended,
                    failure_description(&e, &record.raw_response),
                ));
                return Err(e);
            }
        };
        record.raw_response = raw.clone();

        match parse_receipt(&raw) {
            Ok(receipt) => {
                record.chat_completion = Some(StageDescriptor::succeeded(
                    TaskType::ChatCompletion,
                    started,
                    ended,
                    raw,
                ));
                Ok(receipt)
            }
            Err(e) => {
                record.chat_completion = Some(StageDescriptor::failed(
                    TaskType::ChatCompletion,
                    started,
                    ended,
                    failure_description(&e, &raw),
                ));
                Err(e)
            }
        }
    }

    /// Decrypts the stored API key, if the settings carry one.
    fn credential(&self, resolved: &ResolvedSettings) -> Result<Option<SecretString>, StageError> {
        let Some(ciphertext) = resolved.settings.key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        let cipher = self.cipher.as_ref().ok_or_else(|| {
            StageError::Ai(AiError::Credential(
                "no encryption key configured".to_string(),
            ))
        })?;
        Ok(Some(cipher.decrypt(ciphertext)?))
    }
}

fn failed(
    task_type: TaskType,
    started: DateTime<Utc>,
    ended: DateTime<Utc>,
    error: &StageError,
) -> StageDescriptor {
    StageDescriptor::failed(task_type, started, ended, truncate_description(&error.to_string()))
}

use serde::{Deserialize, Serialize};

use crate::scheduler::queue::{QueueConfiguration, QueueName};

/// Identifier of a stored `ProcessingSettings` or `Prompt` row.
pub type SettingsId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub processing_settings: Vec<ProcessingSettings>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub system: SystemSettings,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    pub fn processing_settings_by_id(&self, id: SettingsId) -> Option<&ProcessingSettings> {
        self.processing_settings.iter().find(|s| s.id == id)
    }

    pub fn prompt_by_id(&self, id: SettingsId) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }
}

/// AI backend a `ProcessingSettings` talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiVendor {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    #[serde(rename = "openai_custom")]
    OpenAiCustom,
    Ollama,
}

impl AiVendor {
    /// Vendors that have no public default endpoint.
    pub fn requires_endpoint(self) -> bool {
        matches!(self, AiVendor::OpenAiCustom | AiVendor::Ollama)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AiVendor::OpenAi => "openai",
            AiVendor::Gemini => "gemini",
            AiVendor::OpenAiCustom => "openai_custom",
            AiVendor::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrEngine {
    Tesseract,
    EasyOcr,
}

impl OcrEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            OcrEngine::Tesseract => "tesseract",
            OcrEngine::EasyOcr => "easy_ocr",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSettings {
    pub id: SettingsId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub ai_type: AiVendor,
    /// Endpoint URL; required for `openai_custom` and `ollama`.
    #[serde(default)]
    pub url: Option<String>,
    /// Hex-encoded AES-256-GCM ciphertext of the API key.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub ocr_engine: Option<OcrEngine>,
    pub prompt_id: SettingsId,
    #[serde(default)]
    pub is_vision_model: bool,
    /// Soft hint only; the scheduler's `task_concurrency` is authoritative.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_worker_count() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: SettingsId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    #[serde(default)]
    pub primary_settings_id: Option<SettingsId>,
    #[serde(default)]
    pub fallback_settings_id: Option<SettingsId>,
    #[serde(default = "default_task_concurrency")]
    pub task_concurrency: usize,
    /// Seconds between email polls; 0 disables polling.
    #[serde(default = "default_email_polling_interval")]
    pub email_polling_interval: u64,
    #[serde(default = "default_queues")]
    pub queues: Vec<QueueConfiguration>,
}

fn default_task_concurrency() -> usize {
    10
}

fn default_email_polling_interval() -> u64 {
    1800
}

pub fn default_queues() -> Vec<QueueConfiguration> {
    vec![
        QueueConfiguration::new(QueueName::ReceiptProcessing, 4),
        QueueConfiguration::new(QueueName::EmailReceiptProcessing, 3),
        QueueConfiguration::new(QueueName::EmailPolling, 2),
        QueueConfiguration::new(QueueName::BulkOperations, 1),
        QueueConfiguration::new(QueueName::EmailReceiptImageCleanup, 1),
        QueueConfiguration::new(QueueName::SystemCleanUp, 1),
    ]
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            primary_settings_id: None,
            fallback_settings_id: None,
            task_concurrency: default_task_concurrency(),
            email_polling_interval: default_email_polling_interval(),
            queues: default_queues(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_ai_timeout_secs")]
    pub ai_timeout_secs: u64,
    /// Upper bound for one external OCR process run.
    #[serde(default = "default_ocr_timeout_secs")]
    pub ocr_timeout_secs: u64,
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: Vec<String>,
    #[serde(default = "default_grace_period_secs")]
    pub shutdown_grace_period_secs: u64,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub encryption_key: KeySource,
}

fn default_ai_timeout_secs() -> u64 {
    120
}

fn default_ocr_timeout_secs() -> u64 {
    60
}

fn default_ocr_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_grace_period_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ai_timeout_secs: default_ai_timeout_secs(),
            ocr_timeout_secs: default_ocr_timeout_secs(),
            ocr_languages: default_ocr_languages(),
            shutdown_grace_period_secs: default_grace_period_secs(),
            database_path: None,
            encryption_key: KeySource::default(),
        }
    }
}

/// Where the credential encryption key comes from, tried in field order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySource {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_key_env_var")]
    pub env_var: Option<String>,
}

fn default_key_env_var() -> Option<String> {
    Some(crate::secrets::TOKEN_KEY_ENV_VAR.to_string())
}

impl Default for KeySource {
    fn default() -> Self {
        Self {
            value: None,
            file: None,
            env_var: default_key_env_var(),
        }
    }
}

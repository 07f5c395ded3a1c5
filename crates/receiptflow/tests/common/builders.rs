//! Builders for settings files used across integration tests.

#![allow(dead_code)]

use receiptflow::config::{
    AiVendor, Config, EngineConfig, OcrEngine, ProcessingSettings, Prompt, SystemSettings,
};
use receiptflow::scheduler::{QueueConfiguration, QueueName};

pub struct SettingsBuilder {
    settings: ProcessingSettings,
}

impl SettingsBuilder {
    /// OCR-based settings using Tesseract and the OpenAI vendor.
    pub fn new(id: i64) -> Self {
        Self {
            settings: ProcessingSettings {
                id,
                name: format!("settings-{}", id),
                description: String::new(),
                ai_type: AiVendor::OpenAi,
                url: None,
                key: None,
                model: "gpt-4o-mini".to_string(),
                ocr_engine: Some(OcrEngine::Tesseract),
                prompt_id: 1,
                is_vision_model: false,
                worker_count: 1,
            },
        }
    }

    pub fn vendor(mut self, vendor: AiVendor) -> Self {
        self.settings.ai_type = vendor;
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.settings.url = Some(url.to_string());
        self
    }

    pub fn ocr(mut self, engine: OcrEngine) -> Self {
        self.settings.ocr_engine = Some(engine);
        self
    }

    pub fn vision(mut self) -> Self {
        self.settings.is_vision_model = true;
        self.settings.ocr_engine = None;
        self
    }

    pub fn prompt(mut self, prompt_id: i64) -> Self {
        self.settings.prompt_id = prompt_id;
        self
    }

    pub fn encrypted_key(mut self, ciphertext: &str) -> Self {
        self.settings.key = Some(ciphertext.to_string());
        self
    }

    pub fn build(self) -> ProcessingSettings {
        self.settings
    }
}

pub struct ConfigBuilder {
    settings: Vec<ProcessingSettings>,
    prompts: Vec<Prompt>,
    system: SystemSettings,
    engine: EngineConfig,
}

impl ConfigBuilder {
    /// One prompt (id 1), no processing settings, default queues.
    pub fn new() -> Self {
        Self {
            settings: Vec::new(),
            prompts: vec![Prompt {
                id: 1,
                name: "default".to_string(),
                description: String::new(),
                prompt: "Year @currentYear. Categories @categories. Text: @ocrText".to_string(),
            }],
            system: SystemSettings::default(),
            engine: EngineConfig::default(),
        }
    }

    pub fn settings(mut self, settings: ProcessingSettings) -> Self {
        self.settings.push(settings);
        self
    }

    pub fn prompt(mut self, id: i64, template: &str) -> Self {
        self.prompts.push(Prompt {
            id,
            name: format!("prompt-{}", id),
            description: String::new(),
            prompt: template.to_string(),
        });
        self
    }

    pub fn primary(mut self, id: i64) -> Self {
        self.system.primary_settings_id = Some(id);
        self
    }

    pub fn fallback(mut self, id: i64) -> Self {
        self.system.fallback_settings_id = Some(id);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.system.task_concurrency = concurrency;
        self
    }

    pub fn queues(mut self, queues: &[(QueueName, i32)]) -> Self {
        self.system.queues = queues
            .iter()
            .map(|&(name, priority)| QueueConfiguration::new(name, priority))
            .collect();
        self
    }

    pub fn grace_period_secs(mut self, secs: u64) -> Self {
        self.engine.shutdown_grace_period_secs = secs;
        self
    }

    pub fn build(self) -> Config {
        Config {
            version: "1.0".to_string(),
            processing_settings: self.settings,
            prompts: self.prompts,
            system: self.system,
            engine: self.engine,
        }
    }

    pub fn to_json(self) -> String {
        serde_json::to_string_pretty(&self.build()).expect("config serializes")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Primary (id 1) and fallback (id 2), both OCR-based on different vendors.
pub fn primary_and_fallback() -> ConfigBuilder {
    ConfigBuilder::new()
        .settings(SettingsBuilder::new(1).build())
        .settings(SettingsBuilder::new(2).vendor(AiVendor::Gemini).build())
        .primary(1)
        .fallback(2)
}

pub const VALID_RECEIPT: &str =
    r#"{"name":"Corner Market","amount":23.75,"date":"2026-02-14T00:00:00Z","categories":[{"id":2}],"tags":[]}"#;

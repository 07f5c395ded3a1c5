use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{Config, ProcessingSettings, Prompt, SystemSettings};
use crate::config::template::unknown_variables;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/settings-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported settings version: {}", config.version),
        });
    }

    let mut prompt_ids = HashSet::new();
    for prompt in &config.prompts {
        if !prompt_ids.insert(prompt.id) {
            return Err(ConfigError::InvalidPrompt {
                id: prompt.id,
                reason: "Duplicate prompt ID".to_string(),
            });
        }
        validate_prompt(prompt)?;
    }

    let mut settings_ids = HashSet::new();
    for settings in &config.processing_settings {
        if !settings_ids.insert(settings.id) {
            return Err(ConfigError::InvalidProcessingSettings {
                id: settings.id,
                reason: "Duplicate processing settings ID".to_string(),
            });
        }
        validate_processing_settings(settings)?;
        if !prompt_ids.contains(&settings.prompt_id) {
            return Err(ConfigError::InvalidProcessingSettings {
                id: settings.id,
                reason: format!("Unknown prompt_id {}", settings.prompt_id),
            });
        }
    }

    validate_system_settings(&config.system)?;

    for id in [
        config.system.primary_settings_id,
        config.system.fallback_settings_id,
    ]
    .into_iter()
    .flatten()
    {
        if !settings_ids.contains(&id) {
            return Err(ConfigError::InvalidSystemSettings {
                reason: format!("Unknown processing settings ID {}", id),
            });
        }
    }

    Ok(())
}

/// Rejects templates that are empty or reference unknown `@variables`.
pub fn validate_prompt(prompt: &Prompt) -> Result<(), ConfigError> {
    if prompt.name.trim().is_empty() {
        return Err(ConfigError::InvalidPrompt {
            id: prompt.id,
            reason: "Name cannot be empty".to_string(),
        });
    }
    if prompt.prompt.trim().is_empty() {
        return Err(ConfigError::InvalidPrompt {
            id: prompt.id,
            reason: "Prompt cannot be empty".to_string(),
        });
    }

    let unknown = unknown_variables(&prompt.prompt);
    if !unknown.is_empty() {
        return Err(ConfigError::InvalidPrompt {
            id: prompt.id,
            reason: format!("Invalid template variables found: {}", unknown.join(", ")),
        });
    }

    Ok(())
}

pub fn validate_processing_settings(settings: &ProcessingSettings) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidProcessingSettings {
        id: settings.id,
        reason: reason.to_string(),
    };

    if settings.name.trim().is_empty() {
        return Err(invalid("name is required"));
    }
    if settings.worker_count == 0 {
        return Err(invalid("worker_count must be greater than 0"));
    }
    if !settings.is_vision_model && settings.ocr_engine.is_none() {
        return Err(invalid("ocr_engine is required unless is_vision_model is set"));
    }
    if settings.ai_type.requires_endpoint()
        && settings.url.as_deref().map_or(true, |u| u.trim().is_empty())
    {
        return Err(invalid(&format!(
            "url is required for ai_type {}",
            settings.ai_type.as_str()
        )));
    }

    Ok(())
}

/// Checks the SystemSettings invariants that do not depend on other rows.
pub fn validate_system_settings(system: &SystemSettings) -> Result<(), ConfigError> {
    if system.fallback_settings_id.is_some() && system.primary_settings_id.is_none() {
        return Err(ConfigError::InvalidSystemSettings {
            reason: "fallback requires primary: fallback_settings_id cannot be set without primary_settings_id".to_string(),
        });
    }

    if let (Some(primary), Some(fallback)) =
        (system.primary_settings_id, system.fallback_settings_id)
    {
        if primary == fallback {
            return Err(ConfigError::InvalidSystemSettings {
                reason: "fallback_settings_id cannot be the same as primary_settings_id"
                    .to_string(),
            });
        }
    }

    if system.task_concurrency == 0 {
        return Err(ConfigError::InvalidSystemSettings {
            reason: "task_concurrency must be greater than 0".to_string(),
        });
    }

    let mut names = HashSet::new();
    for queue in &system.queues {
        if !names.insert(queue.name) {
            return Err(ConfigError::InvalidQueue {
                reason: format!("Duplicate queue '{}'", queue.name),
            });
        }
        if queue.priority < 0 {
            return Err(ConfigError::InvalidQueue {
                reason: format!("Queue '{}' has negative priority", queue.name),
            });
        }
    }

    let active_queues = system.queues.iter().filter(|q| q.priority > 0).count();
    if active_queues > system.task_concurrency {
        return Err(ConfigError::InvalidQueue {
            reason: format!(
                "task_concurrency {} is lower than the {} queues with priority > 0",
                system.task_concurrency, active_queues
            ),
        });
    }

    Ok(())
}

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{ActiveSettings, PromptOverrides, ResolvedSettings, SettingsError, SettingsStore};
use crate::config::{load_config, validate_config, Config, Prompt, SettingsId};
use crate::scheduler::SchedulerConfig;

/// Settings backed by the JSON settings file.
///
/// Reads hand out an `Arc<Config>` snapshot; [`reload`](Self::reload) and
/// [`replace`](Self::replace) swap the whole snapshot atomically after
/// validating it, so readers never see a half-applied change.
pub struct ConfigSettingsStore {
    config: RwLock<Arc<Config>>,
    path: Option<PathBuf>,
}

impl ConfigSettingsStore {
    pub fn from_config(config: Config) -> Result<Self, SettingsError> {
        validate_config(&config)?;
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            path: None,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let config = load_config(path)?;
        log::info!(
            "Loaded settings from {} ({} processing settings, {} prompts)",
            crate::sanitize::redact_path(path),
            config.processing_settings.len(),
            config.prompts.len()
        );
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Re-reads the settings file. A store built with `from_config` has
    /// nothing to reload and returns `Ok` unchanged.
    pub fn reload(&self) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            log::debug!("Settings store has no backing file, skipping reload");
            return Ok(());
        };
        let config = load_config(path)?;
        self.swap(config)
    }

    /// Replaces the settings after validating them.
    pub fn replace(&self, config: Config) -> Result<(), SettingsError> {
        validate_config(&config)?;
        self.swap(config)
    }

    pub fn snapshot(&self) -> Result<Arc<Config>, SettingsError> {
        self.config
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| SettingsError::LockPoisoned)
    }

    fn swap(&self, config: Config) -> Result<(), SettingsError> {
        let mut guard = self.config.write().map_err(|_| SettingsError::LockPoisoned)?;
        *guard = Arc::new(config);
        log::info!("Settings updated");
        Ok(())
    }
}

fn resolve(config: &Config, id: SettingsId) -> Result<ResolvedSettings, SettingsError> {
    let settings = config
        .processing_settings_by_id(id)
        .ok_or(SettingsError::UnknownProcessingSettings(id))?;
    let prompt = find_prompt(config, settings.prompt_id)?;
    Ok(ResolvedSettings {
        settings: settings.clone(),
        prompt,
    })
}

fn find_prompt(config: &Config, id: SettingsId) -> Result<Prompt, SettingsError> {
    config
        .prompt_by_id(id)
        .cloned()
        .ok_or(SettingsError::UnknownPrompt(id))
}

fn active_from(config: &Config) -> Result<ActiveSettings, SettingsError> {
    let primary_id = config
        .system
        .primary_settings_id
        .ok_or(SettingsError::NoPrimaryConfigured)?;
    let primary = resolve(config, primary_id)?;
    let fallback = config
        .system
        .fallback_settings_id
        .map(|id| resolve(config, id))
        .transpose()?;
    Ok(ActiveSettings { primary, fallback })
}

impl SettingsStore for ConfigSettingsStore {
    fn active_processing_settings(&self) -> Result<ActiveSettings, SettingsError> {
        let config = self.snapshot()?;
        active_from(&config)
    }

    fn prompt(&self, id: SettingsId) -> Result<Prompt, SettingsError> {
        let config = self.snapshot()?;
        find_prompt(&config, id)
    }

    fn queue_configuration(&self) -> Result<SchedulerConfig, SettingsError> {
        let config = self.snapshot()?;
        Ok(SchedulerConfig {
            concurrency: config.system.task_concurrency,
            queues: config.system.queues.clone(),
            grace_period: Duration::from_secs(config.engine.shutdown_grace_period_secs),
        })
    }

    fn active_processing_settings_with(
        &self,
        overrides: &PromptOverrides,
    ) -> Result<ActiveSettings, SettingsError> {
        let config = self.snapshot()?;
        let mut active = active_from(&config)?;
        if let Some(id) = overrides.primary_prompt_id {
            active.primary.prompt = find_prompt(&config, id)?;
        }
        if let (Some(id), Some(fallback)) = (overrides.fallback_prompt_id, active.fallback.as_mut()) {
            fallback.prompt = find_prompt(&config, id)?;
        }
        Ok(active)
    }
}

//! Read access to processing settings and queue configuration.
//!
//! Callers resolve a snapshot once per invocation (or per scheduler restart)
//! and work from that copy, so a concurrent settings change never mixes two
//! configurations within one run.

mod store;

pub use store::ConfigSettingsStore;

use thiserror::Error;

use crate::config::{ProcessingSettings, Prompt, SettingsId};
use crate::error::ConfigError;
use crate::scheduler::SchedulerConfig;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("No primary processing settings configured")]
    NoPrimaryConfigured,

    #[error("Unknown processing settings ID {0}")]
    UnknownProcessingSettings(SettingsId),

    #[error("Unknown prompt ID {0}")]
    UnknownPrompt(SettingsId),

    #[error("Settings lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A processing settings row together with the prompt it renders.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub settings: ProcessingSettings,
    pub prompt: Prompt,
}

#[derive(Debug, Clone)]
pub struct ActiveSettings {
    pub primary: ResolvedSettings,
    pub fallback: Option<ResolvedSettings>,
}

/// Per-request prompt substitution (e.g. a group-specific prompt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptOverrides {
    pub primary_prompt_id: Option<SettingsId>,
    pub fallback_prompt_id: Option<SettingsId>,
}

impl PromptOverrides {
    pub fn is_empty(&self) -> bool {
        self.primary_prompt_id.is_none() && self.fallback_prompt_id.is_none()
    }
}

pub trait SettingsStore: Send + Sync {
    /// Primary and optional fallback settings, each with its prompt resolved.
    fn active_processing_settings(&self) -> Result<ActiveSettings, SettingsError>;

    fn prompt(&self, id: SettingsId) -> Result<Prompt, SettingsError>;

    /// Global concurrency, queue priorities and drain grace period.
    fn queue_configuration(&self) -> Result<SchedulerConfig, SettingsError>;

    /// Like [`active_processing_settings`](Self::active_processing_settings),
    /// with the requested prompts swapped in.
    fn active_processing_settings_with(
        &self,
        overrides: &PromptOverrides,
    ) -> Result<ActiveSettings, SettingsError> {
        let mut active = self.active_processing_settings()?;
        if let Some(id) = overrides.primary_prompt_id {
            active.primary.prompt = self.prompt(id)?;
        }
        if let (Some(id), Some(fallback)) = (overrides.fallback_prompt_id, active.fallback.as_mut()) {
            fallback.prompt = self.prompt(id)?;
        }
        Ok(active)
    }
}

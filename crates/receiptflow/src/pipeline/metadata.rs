//! Trail of one orchestrator run.
//!
//! A run produces one [`AttemptRecord`] for the primary settings and, when
//! the primary failed and a fallback is configured, a second one for the
//! fallback. Each record holds up to three stage descriptors. The ledger
//! turns every present descriptor into one persisted task row.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ProcessingSettings, SettingsId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Prompt,
    Ocr,
    ChatCompletion,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Prompt => "PROMPT",
            TaskType::Ocr => "OCR",
            TaskType::ChatCompletion => "CHAT_COMPLETION",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PROMPT" => Some(TaskType::Prompt),
            "OCR" => Some(TaskType::Ocr),
            "CHAT_COMPLETION" => Some(TaskType::ChatCompletion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUCCEEDED" => Some(TaskStatus::Succeeded),
            "FAILED" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// Which settings an attempt ran with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptKind {
    Primary,
    Fallback,
}

impl AttemptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptKind::Primary => "PRIMARY",
            AttemptKind::Fallback => "FALLBACK",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRIMARY" => Some(AttemptKind::Primary),
            "FALLBACK" => Some(AttemptKind::Fallback),
            _ => None,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(TaskType, TaskStatus, AttemptKind);

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub description: String,
}

impl StageDescriptor {
    pub fn succeeded(
        task_type: TaskType,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            task_type,
            status: TaskStatus::Succeeded,
            started_at,
            ended_at,
            description: description.into(),
        }
    }

    pub fn failed(
        task_type: TaskType,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            task_type,
            status: TaskStatus::Failed,
            started_at,
            ended_at,
            description: description.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }
}

/// One pass through OCR, prompt rendering and chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub kind: AttemptKind,
    pub settings_id: SettingsId,
    pub settings_name: String,
    pub succeeded: bool,
    /// Raw completion text, or the error body the endpoint returned. Empty
    /// when the chat stage never produced output.
    pub raw_response: String,
    pub prompt: Option<StageDescriptor>,
    pub ocr: Option<StageDescriptor>,
    pub chat_completion: Option<StageDescriptor>,
}

impl AttemptRecord {
    pub fn new(kind: AttemptKind, settings: &ProcessingSettings) -> Self {
        Self {
            kind,
            settings_id: settings.id,
            settings_name: settings.name.clone(),
            succeeded: false,
            raw_response: String::new(),
            prompt: None,
            ocr: None,
            chat_completion: None,
        }
    }

    /// Stage descriptors that were recorded, in prompt, OCR, chat order.
    pub fn descriptors(&self) -> impl Iterator<Item = &StageDescriptor> {
        [&self.prompt, &self.ocr, &self.chat_completion]
            .into_iter()
            .flatten()
    }

    pub fn descriptor(&self, task_type: TaskType) -> Option<&StageDescriptor> {
        match task_type {
            TaskType::Prompt => self.prompt.as_ref(),
            TaskType::Ocr => self.ocr.as_ref(),
            TaskType::ChatCompletion => self.chat_completion.as_ref(),
        }
    }
}

/// Everything the ledger needs to audit one orchestrator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingAttemptMetadata {
    pub primary: AttemptRecord,
    pub fallback: Option<AttemptRecord>,
}

impl ProcessingAttemptMetadata {
    pub fn primary_settings_id_used(&self) -> SettingsId {
        self.primary.settings_id
    }

    pub fn primary_succeeded(&self) -> bool {
        self.primary.succeeded
    }

    pub fn primary_raw_response(&self) -> &str {
        &self.primary.raw_response
    }

    pub fn fallback_settings_id_used(&self) -> Option<SettingsId> {
        self.fallback.as_ref().map(|f| f.settings_id)
    }

    pub fn fallback_succeeded(&self) -> Option<bool> {
        self.fallback.as_ref().map(|f| f.succeeded)
    }

    pub fn fallback_raw_response(&self) -> Option<&str> {
        self.fallback.as_ref().map(|f| f.raw_response.as_str())
    }

    pub fn attempts(&self) -> impl Iterator<Item = &AttemptRecord> {
        std::iter::once(&self.primary).chain(self.fallback.as_ref())
    }

    /// Number of stage descriptors across both attempts (at most six).
    pub fn descriptor_count(&self) -> usize {
        self.attempts().map(|a| a.descriptors().count()).sum()
    }
}

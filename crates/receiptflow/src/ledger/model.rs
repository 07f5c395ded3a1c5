use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SettingsId;
use crate::db::{NewSystemTask, SystemTaskRow};
use crate::pipeline::{AttemptKind, StageDescriptor, TaskStatus, TaskType};

use super::LedgerError;

/// What kind of entity triggered a processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    MagicFill,
    QuickScan,
    EmailUpload,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::MagicFill => "MAGIC_FILL",
            TriggerType::QuickScan => "QUICK_SCAN",
            TriggerType::EmailUpload => "EMAIL_UPLOAD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MAGIC_FILL" => Some(TriggerType::MagicFill),
            "QUICK_SCAN" => Some(TriggerType::QuickScan),
            "EMAIL_UPLOAD" => Some(TriggerType::EmailUpload),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted stage attempt. Never updated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemTask {
    pub id: i64,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub associated_entity_type: TriggerType,
    pub associated_entity_id: i64,
    pub processing_settings_id: SettingsId,
    pub attempt: AttemptKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result_description: String,
    pub ran_by_user_id: Option<i64>,
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(id: i64, value: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::CorruptRow {
            id,
            reason: format!("bad timestamp '{}': {}", value, e),
        })
}

fn corrupt(id: i64, field: &str, value: &str) -> LedgerError {
    LedgerError::CorruptRow {
        id,
        reason: format!("unknown {} '{}'", field, value),
    }
}

pub(crate) fn new_row(
    descriptor: &StageDescriptor,
    attempt: AttemptKind,
    settings_id: SettingsId,
    trigger: TriggerType,
    entity_id: i64,
    ran_by_user_id: Option<i64>,
) -> NewSystemTask {
    NewSystemTask {
        task_type: descriptor.task_type.as_str().to_string(),
        status: descriptor.status.as_str().to_string(),
        associated_entity_type: trigger.as_str().to_string(),
        associated_entity_id: entity_id,
        processing_settings_id: settings_id,
        attempt: attempt.as_str().to_string(),
        started_at: format_timestamp(&descriptor.started_at),
        ended_at: Some(format_timestamp(&descriptor.ended_at)),
        result_description: descriptor.description.clone(),
        ran_by_user_id,
    }
}

impl TryFrom<SystemTaskRow> for SystemTask {
    type Error = LedgerError;

    fn try_from(row: SystemTaskRow) -> Result<Self, Self::Error> {
        let id = row.id;
        Ok(Self {
            id,
            task_type: TaskType::parse(&row.task_type)
                .ok_or_else(|| corrupt(id, "type", &row.task_type))?,
            status: TaskStatus::parse(&row.status)
                .ok_or_else(|| corrupt(id, "status", &row.status))?,
            associated_entity_type: TriggerType::parse(&row.associated_entity_type)
                .ok_or_else(|| corrupt(id, "entity type", &row.associated_entity_type))?,
            associated_entity_id: row.associated_entity_id,
            processing_settings_id: row.processing_settings_id,
            attempt: AttemptKind::parse(&row.attempt)
                .ok_or_else(|| corrupt(id, "attempt", &row.attempt))?,
            started_at: parse_timestamp(id, &row.started_at)?,
            ended_at: row
                .ended_at
                .as_deref()
                .map(|v| parse_timestamp(id, v))
                .transpose()?,
            result_description: row.result_description,
            ran_by_user_id: row.ran_by_user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_conversion() {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let descriptor = StageDescriptor::failed(TaskType::Ocr, started, started, "boom");
        let new = new_row(&descriptor, AttemptKind::Fallback, 4, TriggerType::QuickScan, 9, None);
        assert_eq!(new.started_at, "2026-03-01T12:00:00.000Z");

        let row = SystemTaskRow {
            id: 1,
            task_type: new.task_type,
            status: new.status,
            associated_entity_type: new.associated_entity_type,
            associated_entity_id: new.associated_entity_id,
            processing_settings_id: new.processing_settings_id,
            attempt: new.attempt,
            started_at: new.started_at,
            ended_at: new.ended_at,
            result_description: new.result_description,
            ran_by_user_id: new.ran_by_user_id,
        };
        let task = SystemTask::try_from(row).unwrap();
        assert_eq!(task.task_type, TaskType::Ocr);
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.associated_entity_type, TriggerType::QuickScan);
        assert_eq!(task.attempt, AttemptKind::Fallback);
        assert_eq!(task.started_at, started);
        assert_eq!(task.ended_at, Some(started));
    }

    #[test]
    fn test_corrupt_row() {
        let row = SystemTaskRow {
            id: 3,
            task_type: "UPLOAD".to_string(),
            status: "SUCCEEDED".to_string(),
            associated_entity_type: "MAGIC_FILL".to_string(),
            associated_entity_id: 1,
            processing_settings_id: 1,
            attempt: "PRIMARY".to_string(),
            started_at: "2026-01-01T00:00:00.000Z".to_string(),
            ended_at: None,
            result_description: String::new(),
            ran_by_user_id: None,
        };
        assert!(matches!(
            SystemTask::try_from(row),
            Err(LedgerError::CorruptRow { id: 3, .. })
        ));
    }
}

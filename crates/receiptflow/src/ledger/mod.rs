//! Task ledger: one audit row per pipeline stage that ran.
//!
//! Rows are written independently. A failed write is collected and the
//! remaining rows are still attempted, so a partial audit trail survives.
//! The ledger never deduplicates: recording the same metadata twice yields
//! two row sets.

mod model;

pub use model::{SystemTask, TriggerType};

use std::sync::Arc;

use thiserror::Error;

use crate::db::{system_task_repo, Database, DatabaseError, NewSystemTask, SystemTaskRow, TaskQuery};
use crate::pipeline::ProcessingAttemptMetadata;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{} of {} audit rows failed to write: {}", .failures.len(), .failures.len() + .written.len(), .failures.join("; "))]
    PartialWrite {
        written: Vec<SystemTask>,
        failures: Vec<String>,
    },

    #[error("Corrupt audit row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

/// Storage behind the ledger.
pub trait SystemTaskStore: Send + Sync {
    fn insert_task(&self, task: &NewSystemTask) -> Result<SystemTaskRow, DatabaseError>;

    fn query_tasks(&self, query: &TaskQuery) -> Result<(Vec<SystemTaskRow>, u64), DatabaseError>;

    fn can_be_restarted(&self, entity_type: &str, entity_id: i64) -> Result<bool, DatabaseError>;
}

impl SystemTaskStore for Database {
    fn insert_task(&self, task: &NewSystemTask) -> Result<SystemTaskRow, DatabaseError> {
        let id = system_task_repo::insert(self, task)?;
        Ok(SystemTaskRow {
            id,
            task_type: task.task_type.clone(),
            status: task.status.clone(),
            associated_entity_type: task.associated_entity_type.clone(),
            associated_entity_id: task.associated_entity_id,
            processing_settings_id: task.processing_settings_id,
            attempt: task.attempt.clone(),
            started_at: task.started_at.clone(),
            ended_at: task.ended_at.clone(),
            result_description: task.result_description.clone(),
            ran_by_user_id: task.ran_by_user_id,
        })
    }

    fn query_tasks(&self, query: &TaskQuery) -> Result<(Vec<SystemTaskRow>, u64), DatabaseError> {
        system_task_repo::query(self, query)
    }

    fn can_be_restarted(&self, entity_type: &str, entity_id: i64) -> Result<bool, DatabaseError> {
        system_task_repo::can_be_restarted(self, entity_type, entity_id)
    }
}

/// One page of audit rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPage {
    pub tasks: Vec<SystemTask>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Clone)]
pub struct TaskLedger {
    store: Arc<dyn SystemTaskStore>,
}

impl TaskLedger {
    pub fn new(store: Arc<dyn SystemTaskStore>) -> Self {
        Self { store }
    }

    /// Writes one row per stage descriptor present in `metadata`, primary
    /// attempt first, each in prompt, OCR, chat order.
    pub fn record_attempt(
        &self,
        metadata: &ProcessingAttemptMetadata,
        trigger: TriggerType,
        entity_id: i64,
        ran_by_user_id: Option<i64>,
    ) -> Result<Vec<SystemTask>, LedgerError> {
        let mut written = Vec::with_capacity(metadata.descriptor_count());
        let mut failures = Vec::new();

        for attempt in metadata.attempts() {
            for descriptor in attempt.descriptors() {
                let row = model::new_row(
                    descriptor,
                    attempt.kind,
                    attempt.settings_id,
                    trigger,
                    entity_id,
                    ran_by_user_id,
                );
                let result = self
                    .store
                    .insert_task(&row)
                    .map_err(LedgerError::from)
                    .and_then(SystemTask::try_from);
                match result {
                    Ok(task) => written.push(task),
                    Err(e) => {
                        log::error!(
                            "Failed to record {} {} task for {} {}: {}",
                            attempt.kind,
                            descriptor.task_type,
                            trigger,
                            entity_id,
                            e
                        );
                        failures.push(format!("{} {}: {}", attempt.kind, descriptor.task_type, e));
                    }
                }
            }
        }

        if failures.is_empty() {
            log::debug!(
                "Recorded {} audit rows for {} {}",
                written.len(),
                trigger,
                entity_id
            );
            Ok(written)
        } else {
            Err(LedgerError::PartialWrite { written, failures })
        }
    }

    pub fn query(&self, query: &TaskQuery) -> Result<TaskPage, LedgerError> {
        let (rows, total) = self.store.query_tasks(query)?;
        let tasks = rows
            .into_iter()
            .map(SystemTask::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TaskPage {
            tasks,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    /// All rows for one triggering entity, oldest first.
    pub fn tasks_for(&self, trigger: TriggerType, entity_id: i64) -> Result<Vec<SystemTask>, LedgerError> {
        let mut query = TaskQuery::for_entity(trigger.as_str(), entity_id);
        query.order_by = "id".to_string();
        query.sort_direction = crate::db::SortDirection::Asc;
        query.page_size = u32::MAX as u64;
        Ok(self.query(&query)?.tasks)
    }

    pub fn can_be_restarted(&self, trigger: TriggerType, entity_id: i64) -> Result<bool, LedgerError> {
        Ok(self.store.can_be_restarted(trigger.as_str(), entity_id)?)
    }
}

//! Repository for the `system_tasks` audit table.
//!
//! Rows are append-only: there is no update or delete.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// Columns a caller may sort by.
pub const SORTABLE_COLUMNS: &[&str] = &[
    "id",
    "type",
    "status",
    "associated_entity_type",
    "associated_entity_id",
    "started_at",
    "ended_at",
    "result_description",
    "ran_by_user_id",
];

const DEFAULT_PAGE_SIZE: u64 = 50;

/// A raw row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemTaskRow {
    pub id: i64,
    pub task_type: String,
    pub status: String,
    pub associated_entity_type: String,
    pub associated_entity_id: i64,
    pub processing_settings_id: i64,
    pub attempt: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub result_description: String,
    pub ran_by_user_id: Option<i64>,
}

impl SystemTaskRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            task_type: row.get("type")?,
            status: row.get("status")?,
            associated_entity_type: row.get("associated_entity_type")?,
            associated_entity_id: row.get("associated_entity_id")?,
            processing_settings_id: row.get("processing_settings_id")?,
            attempt: row.get("attempt")?,
            started_at: row.get("started_at")?,
            ended_at: row.get("ended_at")?,
            result_description: row.get("result_description")?,
            ran_by_user_id: row.get("ran_by_user_id")?,
        })
    }
}

/// Row to insert; the id is assigned by SQLite.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSystemTask {
    pub task_type: String,
    pub status: String,
    pub associated_entity_type: String,
    pub associated_entity_id: i64,
    pub processing_settings_id: i64,
    pub attempt: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub result_description: String,
    pub ran_by_user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Paged query over audit rows. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub associated_entity_type: Option<String>,
    pub associated_entity_id: Option<i64>,
    pub order_by: String,
    pub sort_direction: SortDirection,
    pub page: u64,
    pub page_size: u64,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            associated_entity_type: None,
            associated_entity_id: None,
            order_by: "started_at".to_string(),
            sort_direction: SortDirection::Desc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TaskQuery {
    pub fn for_entity(entity_type: impl Into<String>, entity_id: i64) -> Self {
        Self {
            associated_entity_type: Some(entity_type.into()),
            associated_entity_id: Some(entity_id),
            ..Self::default()
        }
    }
}

/// Maps a requested column onto the allow-list.
fn sort_column(requested: &str) -> Result<&'static str, DatabaseError> {
    SORTABLE_COLUMNS
        .iter()
        .copied()
        .find(|c| *c == requested)
        .ok_or_else(|| DatabaseError::InvalidSortColumn(requested.to_string()))
}

/// Inserts one row and returns its id.
pub fn insert(db: &Database, task: &NewSystemTask) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO system_tasks (type, status, associated_entity_type,
             associated_entity_id, processing_settings_id, attempt, started_at, ended_at,
             result_description, ran_by_user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.task_type,
                task.status,
                task.associated_entity_type,
                task.associated_entity_id,
                task.processing_settings_id,
                task.attempt,
                task.started_at,
                task.ended_at,
                task.result_description,
                task.ran_by_user_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<SystemTaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM system_tasks WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], SystemTaskRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// `LIMIT` and `OFFSET` for a 1-based page, rejecting windows SQLite cannot address.
fn page_window(query: &TaskQuery) -> Result<(i64, i64), DatabaseError> {
    let out_of_range = || {
        DatabaseError::InvalidPage(format!(
            "page {} of size {} is out of range",
            query.page, query.page_size
        ))
    };
    let limit = i64::try_from(query.page_size).map_err(|_| out_of_range())?;
    let offset = (query.page - 1)
        .checked_mul(query.page_size)
        .and_then(|offset| i64::try_from(offset).ok())
        .ok_or_else(out_of_range)?;
    Ok((limit, offset))
}

/// Returns one page of matching rows and the total match count.
pub fn query(db: &Database, query: &TaskQuery) -> Result<(Vec<SystemTaskRow>, u64), DatabaseError> {
    let column = sort_column(&query.order_by)?;
    if query.page == 0 {
        return Err(DatabaseError::InvalidPage("page starts at 1".to_string()));
    }
    if query.page_size == 0 {
        return Err(DatabaseError::InvalidPage(
            "page size must be greater than 0".to_string(),
        ));
    }

    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref entity_type) = query.associated_entity_type {
            conditions.push(format!("associated_entity_type = ?{}", param_values.len() + 1));
            param_values.push(Box::new(entity_type.clone()));
        }
        if let Some(entity_id) = query.associated_entity_id {
            conditions.push(format!("associated_entity_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(entity_id));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM system_tasks {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let (limit, offset) = page_window(query)?;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let direction = query.sort_direction.as_sql();
        // id breaks ties so pages never overlap.
        let query_sql = format!(
            "SELECT * FROM system_tasks {} ORDER BY {} {}, id {} LIMIT ?{} OFFSET ?{}",
            where_clause,
            column,
            direction,
            direction,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<SystemTaskRow> = stmt
            .query_map(params_ref.as_slice(), SystemTaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// True when the entity has audit rows and none of its chat-completion
/// stages succeeded.
pub fn can_be_restarted(
    db: &Database,
    entity_type: &str,
    entity_id: i64,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let (total, succeeded): (u64, u64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN type = 'CHAT_COMPLETION' AND status = 'SUCCEEDED'
                                      THEN 1 ELSE 0 END), 0)
             FROM system_tasks
             WHERE associated_entity_type = ?1 AND associated_entity_id = ?2",
            params![entity_type, entity_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(total > 0 && succeeded == 0)
    })
}

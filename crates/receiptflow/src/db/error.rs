//! Errors from the task ledger database.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot create database directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ledger migration v{version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    /// Sort column outside the allow-list. Never silently ignored.
    #[error("Invalid sort column '{0}'")]
    InvalidSortColumn(String),

    /// Page or page size that cannot address a row window.
    #[error("Invalid page request: {0}")]
    InvalidPage(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

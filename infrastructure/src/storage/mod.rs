//! SQLite persistence for tasks and rate-limit buckets
//!
//! Both stores can share one database file; each opens its own connection
//! and relies on SQLite locking for cross-process exclusion.

mod bucket_store;
mod task_store;

pub use bucket_store::SqliteBucketStore;
pub use task_store::SqliteTaskStore;

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure to open or initialize a database.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

fn open_connection(path: &Path) -> Result<Connection, StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(conn)
}

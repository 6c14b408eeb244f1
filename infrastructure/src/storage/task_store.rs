//! SQLite-backed [`TaskStore`]
//!
//! Task metadata lives in `tasks`; contributions are append-only rows in
//! `task_contributions` keyed by `(task_id, sequence)`. Every mutation runs
//! in a `BEGIN IMMEDIATE` transaction, which makes the pending-to-claimed
//! transition exclusive across processes sharing the file.

use super::{StorageError, open_connection};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_application::{TaskStore, TaskStoreError};
use council_domain::{
    Contribution, DiscussionStatistics, DomainError, NewTask, RollingSummary, SessionId,
    SpecialistId, SpecialistStatus, Task, TaskId, TaskResult, TaskStatus,
};
use rusqlite::{
    Connection, Error as SqlError, OptionalExtension, Row, TransactionBehavior, params,
    types::Type,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const TASK_COLUMNS: &str = "id, session, creator, query, assigned, status, created_at, claimed_at,
     completed_at, rolling_summary, specialist_status, final_synthesis, failure_reason, statistics";

pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = open_connection(path)?;
        Self::init_schema(&conn)?;
        debug!("Opened task store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                 id                TEXT PRIMARY KEY,
                 session           TEXT NOT NULL,
                 creator           TEXT NOT NULL,
                 query             TEXT NOT NULL,
                 assigned          TEXT NOT NULL,
                 status            TEXT NOT NULL DEFAULT 'pending',
                 created_at        TEXT NOT NULL,
                 claimed_at        TEXT,
                 completed_at      TEXT,
                 rolling_summary   TEXT,
                 specialist_status TEXT NOT NULL DEFAULT '{}',
                 final_synthesis   TEXT,
                 failure_reason    TEXT,
                 statistics        TEXT
             );

             CREATE INDEX IF NOT EXISTS idx_tasks_session_status
                 ON tasks(session, status);

             CREATE TABLE IF NOT EXISTS task_contributions (
                 task_id    TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                 sequence   INTEGER NOT NULL,
                 round      INTEGER NOT NULL,
                 specialist TEXT NOT NULL,
                 text       TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 PRIMARY KEY (task_id, sequence)
             );",
        )
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, TaskStoreError> {
        self.conn
            .lock()
            .map_err(|e| TaskStoreError::Backend(format!("task store lock poisoned: {}", e)))
    }

    /// Load a task (without contributions), apply `f`, write it back.
    fn mutate(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut Task) -> Result<(), DomainError>,
    ) -> Result<(), TaskStoreError> {
        let mut conn = self.lock_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(backend)?;
        let mut task = load_header(&tx, id)?.ok_or(TaskStoreError::NotFound(id))?;
        f(&mut task)?;
        write_state(&tx, &task)?;
        tx.commit().map_err(backend)
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, task: NewTask) -> Result<TaskId, TaskStoreError> {
        let id = TaskId::generate();
        let task = task.into_task(id, Utc::now());
        let conn = self.lock_connection()?;
        conn.execute(
            "INSERT INTO tasks (id, session, creator, query, assigned, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id.to_string(),
                task.session.as_str(),
                task.creator,
                to_json(&task.query)?,
                to_json(&task.assigned)?,
                task.status.as_str(),
                task.created_at.to_rfc3339(),
            ],
        )
        .map_err(backend)?;
        Ok(id)
    }

    async fn claim(&self, id: TaskId) -> Result<Task, TaskStoreError> {
        let mut conn = self.lock_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(backend)?;
        let changed = tx
            .execute(
                "UPDATE tasks SET status = ?1, claimed_at = ?2 WHERE id = ?3 AND status = ?4",
                params![
                    TaskStatus::InProgress.as_str(),
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                    TaskStatus::Pending.as_str(),
                ],
            )
            .map_err(backend)?;
        if changed == 0 {
            return match load_header(&tx, id)? {
                Some(_) => Err(TaskStoreError::ClaimConflict(id)),
                None => Err(TaskStoreError::NotFound(id)),
            };
        }
        let task = load_task(&tx, id)?.ok_or(TaskStoreError::NotFound(id))?;
        tx.commit().map_err(backend)?;
        Ok(task)
    }

    async fn claim_next_pending(&self, session: &SessionId) -> Result<Option<Task>, TaskStoreError> {
        let mut conn = self.lock_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(backend)?;
        let next: Option<String> = tx
            .query_row(
                "SELECT id FROM tasks WHERE session = ?1 AND status = ?2
                 ORDER BY rowid ASC LIMIT 1",
                params![session.as_str(), TaskStatus::Pending.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        let Some(raw) = next else {
            return Ok(None);
        };
        let id: TaskId = raw.parse()?;

        let mut task = load_header(&tx, id)?.ok_or(TaskStoreError::NotFound(id))?;
        task.claim(Utc::now())?;
        write_state(&tx, &task)?;
        tx.commit().map_err(backend)?;
        Ok(Some(task))
    }

    async fn append_result(
        &self,
        id: TaskId,
        contribution: &Contribution,
    ) -> Result<(), TaskStoreError> {
        let mut conn = self.lock_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(backend)?;
        let mut task = load_header(&tx, id)?.ok_or(TaskStoreError::NotFound(id))?;
        task.append_contribution(contribution.clone())?;
        tx.execute(
            "INSERT INTO task_contributions (task_id, sequence, round, specialist, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                contribution.sequence as i64,
                contribution.round,
                contribution.specialist.as_str(),
                contribution.text,
                contribution.timestamp.to_rfc3339(),
            ],
        )
        .map_err(backend)?;
        tx.commit().map_err(backend)
    }

    async fn record_rolling_summary(
        &self,
        id: TaskId,
        summary: &RollingSummary,
    ) -> Result<(), TaskStoreError> {
        self.mutate(id, |task| task.record_rolling_summary(summary.clone()))
    }

    async fn record_progress(
        &self,
        id: TaskId,
        statuses: &BTreeMap<SpecialistId, SpecialistStatus>,
    ) -> Result<(), TaskStoreError> {
        self.mutate(id, |task| task.record_progress(statuses.clone()))
    }

    async fn complete(
        &self,
        id: TaskId,
        final_synthesis: &str,
        statistics: &DiscussionStatistics,
    ) -> Result<(), TaskStoreError> {
        self.mutate(id, |task| {
            task.complete(final_synthesis, Some(statistics.clone()), Utc::now())
        })
    }

    async fn fail(
        &self,
        id: TaskId,
        reason: &str,
        statistics: Option<&DiscussionStatistics>,
    ) -> Result<(), TaskStoreError> {
        self.mutate(id, |task| task.fail(reason, statistics.cloned(), Utc::now()))
    }

    async fn get(&self, id: TaskId) -> Result<Task, TaskStoreError> {
        let conn = self.lock_connection()?;
        load_task(&conn, id)?.ok_or(TaskStoreError::NotFound(id))
    }

    async fn list(&self, session: &SessionId) -> Result<Vec<Task>, TaskStoreError> {
        let conn = self.lock_connection()?;
        let ids: Vec<String> = {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id FROM tasks WHERE session = ?1 ORDER BY rowid ASC",
                )
                .map_err(backend)?;
            let rows = stmt
                .query_map(params![session.as_str()], |row| row.get(0))
                .map_err(backend)?;
            rows.collect::<rusqlite::Result<_>>().map_err(backend)?
        };

        let mut tasks = Vec::with_capacity(ids.len());
        for raw in ids {
            let id: TaskId = raw.parse()?;
            if let Some(task) = load_task(&conn, id)? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn contributions_since(
        &self,
        id: TaskId,
        version: u64,
    ) -> Result<Vec<Contribution>, TaskStoreError> {
        let conn = self.lock_connection()?;
        if load_header(&conn, id)?.is_none() {
            return Err(TaskStoreError::NotFound(id));
        }
        load_contributions(&conn, id, version)
    }
}

fn backend(error: SqlError) -> TaskStoreError {
    TaskStoreError::Backend(error.to_string())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, TaskStoreError> {
    serde_json::to_string(value)
        .map_err(|e| TaskStoreError::Backend(format!("failed to encode task field: {}", e)))
}

fn load_header(conn: &Connection, id: TaskId) -> Result<Option<Task>, TaskStoreError> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    conn.query_row(&sql, params![id.to_string()], map_task_row)
        .optional()
        .map_err(backend)
}

fn load_task(conn: &Connection, id: TaskId) -> Result<Option<Task>, TaskStoreError> {
    let Some(mut task) = load_header(conn, id)? else {
        return Ok(None);
    };
    task.result.contributions = load_contributions(conn, id, 0)?;
    Ok(Some(task))
}

fn load_contributions(
    conn: &Connection,
    id: TaskId,
    after: u64,
) -> Result<Vec<Contribution>, TaskStoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT sequence, round, specialist, text, created_at
             FROM task_contributions
             WHERE task_id = ?1 AND sequence > ?2
             ORDER BY sequence ASC",
        )
        .map_err(backend)?;
    let rows = stmt
        .query_map(params![id.to_string(), after as i64], map_contribution_row)
        .map_err(backend)?;
    rows.collect::<rusqlite::Result<_>>().map_err(backend)
}

/// Persist everything but the contribution rows.
fn write_state(conn: &Connection, task: &Task) -> Result<(), TaskStoreError> {
    let result = &task.result;
    conn.execute(
        "UPDATE tasks SET
             status = ?2,
             claimed_at = ?3,
             completed_at = ?4,
             rolling_summary = ?5,
             specialist_status = ?6,
             final_synthesis = ?7,
             failure_reason = ?8,
             statistics = ?9
         WHERE id = ?1",
        params![
            task.id.to_string(),
            task.status.as_str(),
            task.claimed_at.as_ref().map(DateTime::to_rfc3339),
            task.completed_at.as_ref().map(DateTime::to_rfc3339),
            result.rolling_summary.as_ref().map(to_json).transpose()?,
            to_json(&result.specialist_status)?,
            result.final_synthesis,
            result.failure_reason,
            result.statistics.as_ref().map(to_json).transpose()?,
        ],
    )
    .map_err(backend)?;
    Ok(())
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id_raw: String = row.get(0)?;
    let status_raw: String = row.get(5)?;
    Ok(Task {
        id: id_raw.parse().map_err(|e| conversion(0, e))?,
        session: SessionId::new(row.get::<_, String>(1)?),
        creator: row.get(2)?,
        query: json_column(row, 3)?,
        assigned: json_column(row, 4)?,
        status: status_raw
            .parse::<TaskStatus>()
            .map_err(|e| conversion(5, e))?,
        created_at: time_column(row, 6)?,
        claimed_at: optional_time_column(row, 7)?,
        completed_at: optional_time_column(row, 8)?,
        result: TaskResult {
            contributions: Vec::new(),
            rolling_summary: optional_json_column(row, 9)?,
            specialist_status: json_column(row, 10)?,
            final_synthesis: row.get(11)?,
            failure_reason: row.get(12)?,
            statistics: optional_json_column(row, 13)?,
        },
    })
}

fn map_contribution_row(row: &Row<'_>) -> rusqlite::Result<Contribution> {
    let specialist_raw: String = row.get(2)?;
    Ok(Contribution {
        sequence: i64_to_u64(row.get(0)?, 0)?,
        round: row.get(1)?,
        specialist: SpecialistId::try_new(specialist_raw).map_err(|e| conversion(2, e))?,
        text: row.get(3)?,
        timestamp: time_column(row, 4)?,
    })
}

fn conversion(
    index: usize,
    error: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> SqlError {
    SqlError::FromSqlConversionFailure(index, Type::Text, error.into())
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, index: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw).map_err(|e| conversion(index, e))
}

fn optional_json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    index: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|value| serde_json::from_str(&value).map_err(|e| conversion(index, e)))
        .transpose()
}

fn time_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    parse_time(&raw, index)
}

fn optional_time_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|value| parse_time(&value, index)).transpose()
}

fn parse_time(raw: &str, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion(index, e))
}

fn i64_to_u64(value: i64, index: usize) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|e| SqlError::FromSqlConversionFailure(index, Type::Integer, e.into()))
}

//! SQLite-backed [`BucketStore`]
//!
//! One row per (provider, model). Saves are upserts so any process sharing
//! the file sees the latest token count on its next load.

use super::{StorageError, open_connection};
use chrono::{DateTime, Utc};
use council_application::{BucketStore, BucketStoreError};
use council_domain::{RateLimitKey, TokenBucket};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteBucketStore {
    conn: Mutex<Connection>,
}

impl SqliteBucketStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = open_connection(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rate_limit_buckets (
                 provider       TEXT NOT NULL,
                 model          TEXT NOT NULL,
                 capacity       INTEGER NOT NULL,
                 tokens         REAL NOT NULL,
                 last_refill_at TEXT NOT NULL,
                 reset_at       TEXT,
                 recent         TEXT NOT NULL DEFAULT '[]',
                 updated_at     TEXT NOT NULL,
                 PRIMARY KEY (provider, model)
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, BucketStoreError> {
        self.conn
            .lock()
            .map_err(|e| BucketStoreError::Backend(format!("bucket store lock poisoned: {}", e)))
    }
}

/// Raw column values, decoded into a bucket outside the row closure so a
/// bad record names its key.
struct BucketRow {
    provider: String,
    model: String,
    capacity: u32,
    tokens: f64,
    last_refill_at: String,
    reset_at: Option<String>,
    recent: String,
    updated_at: String,
}

impl BucketRow {
    const COLUMNS: &'static str =
        "provider, model, capacity, tokens, last_refill_at, reset_at, recent, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            provider: row.get(0)?,
            model: row.get(1)?,
            capacity: row.get(2)?,
            tokens: row.get(3)?,
            last_refill_at: row.get(4)?,
            reset_at: row.get(5)?,
            recent: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn key(&self) -> RateLimitKey {
        RateLimitKey::new(&self.provider, &self.model)
    }

    fn decode(self) -> Result<(RateLimitKey, TokenBucket), BucketStoreError> {
        let key = self.key();
        let corrupt = |reason: String| BucketStoreError::Corrupt {
            key: key.to_string(),
            reason,
        };
        let parse = |field: &str, raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| corrupt(format!("{}: {}", field, e)))
        };

        let last_refill_at = parse("last_refill_at", &self.last_refill_at)?;
        let updated_at = parse("updated_at", &self.updated_at)?;
        let reset_at = self
            .reset_at
            .as_deref()
            .map(|raw| parse("reset_at", raw))
            .transpose()?;
        let recent_raw: Vec<String> = serde_json::from_str(&self.recent)
            .map_err(|e| corrupt(format!("recent: {}", e)))?;
        let recent = recent_raw
            .iter()
            .map(|raw| parse("recent", raw.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let bucket = TokenBucket::restore(
            self.capacity,
            self.tokens,
            last_refill_at,
            reset_at,
            recent,
            updated_at,
        );
        Ok((key, bucket))
    }
}

impl BucketStore for SqliteBucketStore {
    fn load(&self, key: &RateLimitKey) -> Result<Option<TokenBucket>, BucketStoreError> {
        let conn = self.lock_connection()?;
        let sql = format!(
            "SELECT {} FROM rate_limit_buckets WHERE provider = ?1 AND model = ?2",
            BucketRow::COLUMNS
        );
        let row = conn
            .query_row(&sql, params![key.provider, key.model], BucketRow::from_row)
            .optional()
            .map_err(backend)?;
        row.map(|r| r.decode().map(|(_, bucket)| bucket)).transpose()
    }

    fn save(&self, key: &RateLimitKey, bucket: &TokenBucket) -> Result<(), BucketStoreError> {
        let recent: Vec<String> = bucket.recent().map(DateTime::to_rfc3339).collect();
        let recent = serde_json::to_string(&recent)
            .map_err(|e| BucketStoreError::Backend(format!("failed to encode bucket: {}", e)))?;

        let conn = self.lock_connection()?;
        conn.execute(
            "INSERT INTO rate_limit_buckets
                 (provider, model, capacity, tokens, last_refill_at, reset_at, recent, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(provider, model) DO UPDATE SET
                 capacity = excluded.capacity,
                 tokens = excluded.tokens,
                 last_refill_at = excluded.last_refill_at,
                 reset_at = excluded.reset_at,
                 recent = excluded.recent,
                 updated_at = excluded.updated_at",
            params![
                key.provider,
                key.model,
                bucket.capacity(),
                bucket.tokens(),
                bucket.last_refill_at().to_rfc3339(),
                bucket.reset_at().as_ref().map(DateTime::to_rfc3339),
                recent,
                bucket.updated_at().to_rfc3339(),
            ],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<(RateLimitKey, TokenBucket)>, BucketStoreError> {
        let conn = self.lock_connection()?;
        let sql = format!(
            "SELECT {} FROM rate_limit_buckets ORDER BY provider ASC, model ASC",
            BucketRow::COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(backend)?;
        let rows = stmt
            .query_map([], BucketRow::from_row)
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;
        rows.into_iter().map(BucketRow::decode).collect()
    }
}

fn backend(error: rusqlite::Error) -> BucketStoreError {
    BucketStoreError::Backend(error.to_string())
}

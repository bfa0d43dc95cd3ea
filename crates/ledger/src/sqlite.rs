//! SQLite-backed usage store.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cg_domain::usage::{UsageEvent, UsageStats, WindowTotals};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::{stats_from_counts, LedgerError, LedgerResult, UsageStore};

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS usage_events (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    model_id TEXT NOT NULL,
    tokens_used INTEGER NOT NULL,
    request_count INTEGER NOT NULL DEFAULT 1,
    occurred_at_us INTEGER NOT NULL,
    success INTEGER NOT NULL DEFAULT 1,
    agent_used TEXT,
    endpoint TEXT
);

CREATE INDEX IF NOT EXISTS idx_usage_user_model_time
    ON usage_events(user_id, model_id, occurred_at_us);
CREATE INDEX IF NOT EXISTS idx_usage_time ON usage_events(occurred_at_us);
"#;

pub struct SqliteUsageStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteUsageStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub async fn open(path: PathBuf) -> LedgerResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, rusqlite::Error>(conn)
        })
        .await??;

        tracing::debug!(path = %path.display(), "usage ledger opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

/// Events are stored as whole microseconds, so a lower bound with
/// sub-microsecond precision rounds up to keep `>=` and `<` exact.
fn ceil_micros(t: DateTime<Utc>) -> i64 {
    let floor = t.timestamp_micros();
    if t.timestamp_subsec_nanos() % 1_000 == 0 {
        floor
    } else {
        floor + 1
    }
}

fn to_u64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn append(&self, event: UsageEvent) -> LedgerResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO usage_events
                    (id, user_id, model_id, tokens_used, request_count, occurred_at_us,
                     success, agent_used, endpoint)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    event.id.to_string(),
                    event.user_id,
                    event.model_id,
                    i64::try_from(event.tokens_used).unwrap_or(i64::MAX),
                    event.request_count,
                    event.occurred_at.timestamp_micros(),
                    event.success,
                    event.agent_used,
                    event.endpoint,
                ],
            )?;
            Ok::<_, LedgerError>(())
        })
        .await?
    }

    async fn window_totals(
        &self,
        user_id: &str,
        model_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> LedgerResult<WindowTotals> {
        let conn = Arc::clone(&self.conn);
        let (user_id, model_id) = (user_id.to_string(), model_id.to_string());
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let (requests, tokens): (i64, i64) = conn.query_row(
                "SELECT COALESCE(SUM(request_count), 0), COALESCE(SUM(tokens_used), 0)
                 FROM usage_events
                 WHERE user_id = ?1 AND model_id = ?2 AND success = 1
                   AND occurred_at_us >= ?3 AND occurred_at_us <= ?4",
                params![user_id, model_id, ceil_micros(since), until.timestamp_micros()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok::<_, LedgerError>(WindowTotals {
                requests: to_u64(requests),
                tokens: to_u64(tokens),
            })
        })
        .await?
    }

    async fn stats(
        &self,
        user_id: &str,
        model_id: Option<&str>,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> LedgerResult<UsageStats> {
        let conn = Arc::clone(&self.conn);
        let user_id = user_id.to_string();
        let model_id = model_id.map(str::to_string);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let (events, successes, requests, tokens): (i64, i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(success), 0),
                        COALESCE(SUM(request_count), 0),
                        COALESCE(SUM(tokens_used), 0)
                 FROM usage_events
                 WHERE user_id = ?1 AND (?2 IS NULL OR model_id = ?2)
                   AND occurred_at_us >= ?3 AND occurred_at_us <= ?4",
                params![user_id, model_id, ceil_micros(since), until.timestamp_micros()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
            Ok::<_, LedgerError>(stats_from_counts(
                to_u64(events),
                to_u64(successes),
                to_u64(requests),
                to_u64(tokens),
            ))
        })
        .await?
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let removed = conn.execute(
                "DELETE FROM usage_events WHERE occurred_at_us < ?1",
                params![ceil_micros(cutoff)],
            )?;
            Ok::<_, LedgerError>(removed as u64)
        })
        .await?
    }
}

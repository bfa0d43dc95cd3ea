//! Append-only usage ledger with pluggable backends.
//!
//! - `memory`: process-local vector (non-persistent, for tests and local runs)
//! - `sqlite`: single SQLite file in WAL mode
//!
//! Events are only ever appended; the retention sweep is the single path
//! that removes rows.

mod memory;
mod sqlite;

pub use memory::InMemoryUsageStore;
pub use sqlite::SqliteUsageStore;

use std::sync::Arc;

use async_trait::async_trait;
use cg_domain::config::{LedgerBackend, QuotaConfig};
use cg_domain::usage::{UsageEvent, UsageStats, WindowTotals};
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<LedgerError> for cg_domain::Error {
    fn from(e: LedgerError) -> Self {
        cg_domain::Error::Ledger(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Usage store trait, implemented by every backend.
///
/// Window bounds are inclusive on both ends: `[since, until]`.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Append one event. Safe under concurrent callers.
    async fn append(&self, event: UsageEvent) -> LedgerResult<()>;

    /// Sum of `request_count` and `tokens_used` over successful events for
    /// one (user, model) pair inside the window.
    async fn window_totals(
        &self,
        user_id: &str,
        model_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> LedgerResult<WindowTotals>;

    /// Analytics over all events (failed included) for a user, optionally
    /// restricted to one model.
    async fn stats(
        &self,
        user_id: &str,
        model_id: Option<&str>,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> LedgerResult<UsageStats>;

    /// Delete events strictly older than `cutoff`. Returns the number removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64>;
}

/// Compute `UsageStats` from raw counts.
pub(crate) fn stats_from_counts(events: u64, successes: u64, requests: u64, tokens: u64) -> UsageStats {
    let success_rate = if events == 0 {
        0.0
    } else {
        successes as f64 / events as f64 * 100.0
    };
    UsageStats {
        total_requests: requests,
        total_tokens: tokens,
        success_rate,
    }
}

/// Open the backend selected by `[quota] store`.
pub async fn open_store(config: &QuotaConfig) -> LedgerResult<Arc<dyn UsageStore>> {
    let store: Arc<dyn UsageStore> = match config.store {
        LedgerBackend::Memory => Arc::new(InMemoryUsageStore::new()),
        LedgerBackend::Sqlite => Arc::new(SqliteUsageStore::open(config.sqlite_path.clone()).await?),
    };
    Ok(store)
}

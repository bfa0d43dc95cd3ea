//! In-memory usage store (non-persistent).

use std::sync::Arc;

use async_trait::async_trait;
use cg_domain::usage::{UsageEvent, UsageStats, WindowTotals};
use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::RwLock;

use crate::{stats_from_counts, LedgerResult, UsageStore};

#[derive(Clone, Default)]
pub struct InMemoryUsageStore {
    events: Arc<RwLock<Vec<UsageEvent>>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

fn in_window(ev: &UsageEvent, since: DateTime<Utc>, until: DateTime<Utc>) -> bool {
    ev.occurred_at >= since && ev.occurred_at <= until
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn append(&self, mut event: UsageEvent) -> LedgerResult<()> {
        event.occurred_at = event.occurred_at.trunc_subsecs(6);
        self.events.write().push(event);
        Ok(())
    }

    async fn window_totals(
        &self,
        user_id: &str,
        model_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> LedgerResult<WindowTotals> {
        let events = self.events.read();
        let totals = events
            .iter()
            .filter(|ev| ev.success && ev.user_id == user_id && ev.model_id == model_id)
            .filter(|ev| in_window(ev, since, until))
            .fold(WindowTotals::default(), |acc, ev| WindowTotals {
                requests: acc.requests.saturating_add(u64::from(ev.request_count)),
                tokens: acc.tokens.saturating_add(ev.tokens_used),
            });
        Ok(totals)
    }

    async fn stats(
        &self,
        user_id: &str,
        model_id: Option<&str>,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> LedgerResult<UsageStats> {
        let events = self.events.read();
        let (mut count, mut ok, mut requests, mut tokens) = (0u64, 0u64, 0u64, 0u64);
        for ev in events.iter().filter(|ev| {
            ev.user_id == user_id
                && model_id.map_or(true, |m| ev.model_id == m)
                && in_window(ev, since, until)
        }) {
            count = count.saturating_add(1);
            ok = ok.saturating_add(u64::from(ev.success));
            requests = requests.saturating_add(u64::from(ev.request_count));
            tokens = tokens.saturating_add(ev.tokens_used);
        }
        Ok(stats_from_counts(count, ok, requests, tokens))
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> LedgerResult<u64> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|ev| ev.occurred_at >= cutoff);
        Ok((before - events.len()) as u64)
    }
}

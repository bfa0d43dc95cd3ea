//! Multi-window quota enforcement over the usage ledger.
//!
//! [`QuotaEngine`] answers "may this (user, model) pair run right now?" by
//! summing successful ledger events over two rolling windows (60 s and 24 h)
//! and comparing against the resolved [`QuotaPolicy`]. Ledger failures never
//! block a request: admission fails open and recording is skipped, both
//! logged with `degraded = true`.
//!
//! Admission is best-effort. Two concurrent requests may both see the same
//! usage and jointly exceed a ceiling.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use cg_domain::config::QuotaConfig;
use cg_domain::quota::{AdmissionDecision, Limit, QuotaPolicy, QuotaStatus, QuotaUsed};
use cg_domain::usage::{StatsRange, UsageEvent, UsageStats};
use cg_ledger::{LedgerResult, UsageStore};

/// Used only if the configured fallback model has no policy at all.
const LAST_RESORT_POLICY: QuotaPolicy = QuotaPolicy::new(
    Limit::Max(30),
    Limit::Max(14_400),
    Limit::Max(6_000),
    Limit::Max(500_000),
);

fn minute() -> Duration {
    Duration::seconds(60)
}

fn day() -> Duration {
    Duration::hours(24)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QuotaEngine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct QuotaEngine {
    store: Arc<dyn UsageStore>,
    policies: BTreeMap<String, QuotaPolicy>,
    fallback: QuotaPolicy,
    user_overrides: HashMap<String, HashMap<String, QuotaPolicy>>,
}

impl QuotaEngine {
    pub fn new(store: Arc<dyn UsageStore>, config: &QuotaConfig) -> Self {
        let policies = config.model_policies();
        let fallback = match policies.get(&config.fallback_model) {
            Some(p) => *p,
            None => {
                tracing::warn!(
                    fallback_model = %config.fallback_model,
                    "fallback model has no quota policy, using built-in last-resort limits"
                );
                LAST_RESORT_POLICY
            }
        };
        Self {
            store,
            policies,
            fallback,
            user_overrides: config.users.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }

    /// Resolve the effective policy: user override for the exact model, then
    /// the model's own policy, then the fallback policy.
    pub fn policy_for(&self, user_id: &str, model_id: &str) -> QuotaPolicy {
        self.user_overrides
            .get(user_id)
            .and_then(|models| models.get(model_id))
            .or_else(|| self.policies.get(model_id))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Every model with a known policy, including models that only appear in
    /// this user's overrides.
    pub fn known_models(&self, user_id: &str) -> Vec<String> {
        let mut models: Vec<String> = self.policies.keys().cloned().collect();
        if let Some(overrides) = self.user_overrides.get(user_id) {
            for model in overrides.keys() {
                if !self.policies.contains_key(model) {
                    models.push(model.clone());
                }
            }
        }
        models.sort();
        models
    }

    async fn used_at(
        &self,
        user_id: &str,
        model_id: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<QuotaUsed> {
        let last_minute = self
            .store
            .window_totals(user_id, model_id, now - minute(), now)
            .await?;
        let last_day = self
            .store
            .window_totals(user_id, model_id, now - day(), now)
            .await?;
        Ok(QuotaUsed {
            rpm: last_minute.requests,
            rpd: last_day.requests,
            tpm: last_minute.tokens,
            tpd: last_day.tokens,
        })
    }

    // ── Admission ────────────────────────────────────────────────────

    pub async fn check_admission(&self, user_id: &str, model_id: &str) -> AdmissionDecision {
        self.check_admission_at(user_id, model_id, Utc::now()).await
    }

    pub async fn check_admission_at(
        &self,
        user_id: &str,
        model_id: &str,
        now: DateTime<Utc>,
    ) -> AdmissionDecision {
        let policy = self.policy_for(user_id, model_id);
        match self.used_at(user_id, model_id, now).await {
            Ok(used) => {
                let decision = policy.evaluate(&used);
                if let Some(reason) = decision.reason {
                    tracing::info!(
                        user_id,
                        model_id,
                        reason = %reason,
                        rpm = used.rpm,
                        rpd = used.rpd,
                        tpm = used.tpm,
                        tpd = used.tpd,
                        "quota exceeded"
                    );
                }
                decision
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    model_id,
                    error = %e,
                    degraded = true,
                    "usage ledger unavailable, admitting request"
                );
                AdmissionDecision::admitted()
            }
        }
    }

    // ── Recording ────────────────────────────────────────────────────

    /// Append one usage event. Never fails; a ledger error is logged and the
    /// event is dropped.
    pub async fn record_usage(&self, event: UsageEvent) {
        let (user_id, model_id) = (event.user_id.clone(), event.model_id.clone());
        let (tokens, success) = (event.tokens_used, event.success);
        match self.store.append(event).await {
            Ok(()) => tracing::debug!(
                user_id = %user_id,
                model_id = %model_id,
                tokens,
                success,
                "usage recorded"
            ),
            Err(e) => tracing::warn!(
                user_id = %user_id,
                model_id = %model_id,
                error = %e,
                degraded = true,
                "usage recording skipped"
            ),
        }
    }

    // ── Introspection ────────────────────────────────────────────────

    pub async fn quota_status(&self, user_id: &str, model_id: &str) -> QuotaStatus {
        self.quota_status_at(user_id, model_id, Utc::now()).await
    }

    pub async fn quota_status_at(
        &self,
        user_id: &str,
        model_id: &str,
        now: DateTime<Utc>,
    ) -> QuotaStatus {
        let limits = self.policy_for(user_id, model_id);
        match self.used_at(user_id, model_id, now).await {
            Ok(used) => QuotaStatus {
                model: model_id.to_string(),
                limits,
                used,
                ok: limits.evaluate(&used).ok,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(
                    user_id,
                    model_id,
                    error = %e,
                    degraded = true,
                    "usage ledger unavailable, reporting zero usage"
                );
                QuotaStatus {
                    model: model_id.to_string(),
                    limits,
                    used: QuotaUsed::default(),
                    ok: true,
                    degraded: true,
                }
            }
        }
    }

    pub async fn all_quota_statuses(&self, user_id: &str) -> BTreeMap<String, QuotaStatus> {
        let now = Utc::now();
        let mut out = BTreeMap::new();
        for model in self.known_models(user_id) {
            let status = self.quota_status_at(user_id, &model, now).await;
            out.insert(model, status);
        }
        out
    }

    /// Analytics over `range` ending now. Reports zeros if the ledger is down.
    pub async fn usage_stats(
        &self,
        user_id: &str,
        model_id: Option<&str>,
        range: StatsRange,
    ) -> UsageStats {
        let now = Utc::now();
        match self.store.stats(user_id, model_id, now - range.duration(), now).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(user_id, error = %e, degraded = true, "usage stats unavailable");
                UsageStats::default()
            }
        }
    }

    // ── Maintenance ──────────────────────────────────────────────────

    /// Delete events older than `retention_days` before `now`.
    pub async fn purge_older_than(
        &self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> LedgerResult<u64> {
        let cutoff = now - Duration::days(i64::from(retention_days));
        let removed = self.store.purge_before(cutoff).await?;
        tracing::info!(removed, retention_days, cutoff = %cutoff, "usage retention sweep");
        Ok(removed)
    }
}

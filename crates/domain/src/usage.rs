//! Usage ledger records.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token usage reported by a provider for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Component-wise sum, used to total several completions in one turn.
    pub fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(other.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }
}

/// One immutable usage fact: a completed or attempted model invocation.
///
/// Events are appended once and never updated; the retention sweep is the
/// only thing that removes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub id: Uuid,
    pub user_id: String,
    pub model_id: String,
    pub tokens_used: u64,
    /// Normally 1.
    pub request_count: u32,
    pub occurred_at: DateTime<Utc>,
    /// Failed invocations are kept for analytics but never consume quota.
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl UsageEvent {
    /// A single-request event stamped with `occurred_at`, truncated to the
    /// microsecond precision every ledger backend keeps.
    pub fn new(
        user_id: impl Into<String>,
        model_id: impl Into<String>,
        tokens_used: u64,
        success: bool,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            model_id: model_id.into(),
            tokens_used,
            request_count: 1,
            occurred_at: occurred_at.trunc_subsecs(6),
            success,
            agent_used: None,
            endpoint: None,
        }
    }

    pub fn with_agent(mut self, agent: Option<&str>) -> Self {
        self.agent_used = agent.map(str::to_owned);
        self
    }

    pub fn with_endpoint(mut self, endpoint: Option<&str>) -> Self {
        self.endpoint = endpoint.map(str::to_owned);
        self
    }
}

/// Request and token totals for one (user, model) pair inside one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTotals {
    pub requests: u64,
    pub tokens: u64,
}

/// Aggregated analytics over a time range. Unlike quota windows these
/// include failed events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_requests: u64,
    pub total_tokens: u64,
    /// Percentage of successful events, `0.0` when there are none.
    pub success_rate: f64,
}

/// Look-back ranges accepted by the usage analytics endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsRange {
    #[serde(rename = "1h")]
    LastHour,
    #[default]
    #[serde(rename = "24h")]
    LastDay,
    #[serde(rename = "7d")]
    LastWeek,
    #[serde(rename = "30d")]
    LastMonth,
}

impl StatsRange {
    pub fn duration(self) -> Duration {
        match self {
            StatsRange::LastHour => Duration::hours(1),
            StatsRange::LastDay => Duration::hours(24),
            StatsRange::LastWeek => Duration::days(7),
            StatsRange::LastMonth => Duration::days(30),
        }
    }

    /// Parse the short form (`1h`, `24h`, `7d`, `30d`). Anything else falls
    /// back to the last 24 hours.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            Some("1h") => StatsRange::LastHour,
            Some("7d") => StatsRange::LastWeek,
            Some("30d") => StatsRange::LastMonth,
            _ => StatsRange::LastDay,
        }
    }
}

//! Quota policies and admission decisions.
//!
//! A [`QuotaPolicy`] carries four independent ceilings. Each ceiling is a
//! [`Limit`]: either a positive maximum or unlimited (`-1` on the wire and
//! in config files).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Model whose policy applies when a model has no entry of its own.
pub const FALLBACK_MODEL: &str = "llama-3.1-8b-instant";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One quota ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Limit {
    Unlimited,
    Max(u64),
}

impl Limit {
    /// `true` when `used` is strictly below the ceiling. Unlimited always
    /// admits.
    pub fn admits(self, used: u64) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::Max(max) => used < max,
        }
    }
}

impl TryFrom<i64> for Limit {
    type Error = String;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            -1 => Ok(Limit::Unlimited),
            n if n > 0 => Ok(Limit::Max(n as u64)),
            n => Err(format!("quota ceiling must be positive or -1 (unlimited), got {n}")),
        }
    }
}

impl From<Limit> for i64 {
    fn from(limit: Limit) -> i64 {
        match limit {
            Limit::Unlimited => -1,
            Limit::Max(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy / usage / decision
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-model ceilings: requests and tokens, per minute and per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub rpm: Limit,
    pub rpd: Limit,
    pub tpm: Limit,
    pub tpd: Limit,
}

/// Usage inside the four rolling windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsed {
    pub rpm: u64,
    pub rpd: u64,
    pub tpm: u64,
    pub tpd: u64,
}

/// Which ceiling rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotaReason {
    RpmExceeded,
    RpdExceeded,
    TpmExceeded,
    TpdExceeded,
}

impl QuotaReason {
    /// Stable machine-readable code, e.g. `RPM_EXCEEDED`.
    pub fn code(self) -> &'static str {
        match self {
            QuotaReason::RpmExceeded => "RPM_EXCEEDED",
            QuotaReason::RpdExceeded => "RPD_EXCEEDED",
            QuotaReason::TpmExceeded => "TPM_EXCEEDED",
            QuotaReason::TpdExceeded => "TPD_EXCEEDED",
        }
    }

    /// Human-readable message for rejection bodies.
    pub fn message(self) -> &'static str {
        match self {
            QuotaReason::RpmExceeded => "Rate limit: requests per minute exceeded",
            QuotaReason::RpdExceeded => "Rate limit: requests per day exceeded",
            QuotaReason::TpmExceeded => "Token limit: tokens per minute exceeded",
            QuotaReason::TpdExceeded => "Token limit: tokens per day exceeded",
        }
    }
}

impl fmt::Display for QuotaReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of an admission check. Computed per request, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<QuotaReason>,
}

impl AdmissionDecision {
    pub fn admitted() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn denied(reason: QuotaReason) -> Self {
        Self { ok: false, reason: Some(reason) }
    }
}

impl QuotaPolicy {
    pub const fn new(rpm: Limit, rpd: Limit, tpm: Limit, tpd: Limit) -> Self {
        Self { rpm, rpd, tpm, tpd }
    }

    /// Admit iff `used` is strictly below every finite ceiling. Ceilings are
    /// checked in the order RPM, RPD, TPM, TPD and the first one hit is
    /// reported.
    pub fn evaluate(&self, used: &QuotaUsed) -> AdmissionDecision {
        let checks = [
            (self.rpm, used.rpm, QuotaReason::RpmExceeded),
            (self.rpd, used.rpd, QuotaReason::RpdExceeded),
            (self.tpm, used.tpm, QuotaReason::TpmExceeded),
            (self.tpd, used.tpd, QuotaReason::TpdExceeded),
        ];
        checks
            .into_iter()
            .find(|(limit, used, _)| !limit.admits(*used))
            .map(|(_, _, reason)| AdmissionDecision::denied(reason))
            .unwrap_or_else(AdmissionDecision::admitted)
    }
}

/// Snapshot of one model's policy and current usage for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub model: String,
    pub limits: QuotaPolicy,
    pub used: QuotaUsed,
    pub ok: bool,
    /// Set when the usage ledger could not be read and `used` is a
    /// placeholder.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Built-in policies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const fn policy(rpm: u64, rpd: u64, tpm: u64, tpd: i64) -> QuotaPolicy {
    QuotaPolicy::new(
        Limit::Max(rpm),
        Limit::Max(rpd),
        Limit::Max(tpm),
        if tpd < 0 { Limit::Unlimited } else { Limit::Max(tpd as u64) },
    )
}

/// Hosted-model free-tier limits shipped with the binary.
pub fn builtin_policies() -> BTreeMap<String, QuotaPolicy> {
    [
        ("allam-2-7b", policy(30, 7_000, 6_000, 500_000)),
        ("compound-beta", policy(15, 200, 70_000, -1)),
        ("compound-beta-mini", policy(15, 200, 70_000, -1)),
        ("deepseek-r1-distill-llama-70b", policy(30, 1_000, 6_000, 100_000)),
        ("gemma2-9b-it", policy(30, 14_400, 15_000, 500_000)),
        ("llama-3.1-8b-instant", policy(30, 14_400, 6_000, 500_000)),
        ("llama-3.3-70b-versatile", policy(30, 1_000, 12_000, 100_000)),
        ("llama3-70b-8192", policy(30, 14_400, 6_000, 500_000)),
        ("llama3-8b-8192", policy(30, 14_400, 6_000, 500_000)),
        ("meta-llama/llama-4-maverick-17b-128e-instruct", policy(30, 1_000, 6_000, 500_000)),
        ("meta-llama/llama-4-scout-17b-16e-instruct", policy(30, 1_000, 30_000, 500_000)),
        ("meta-llama/llama-guard-4-12b", policy(30, 14_400, 15_000, 500_000)),
        ("meta-llama/llama-prompt-guard-2-22m", policy(30, 14_400, 15_000, 500_000)),
        ("meta-llama/llama-prompt-guard-2-86m", policy(30, 14_400, 15_000, 500_000)),
        ("mistral-saba-24b", policy(30, 1_000, 6_000, 500_000)),
        ("moonshotai/kimi-k2-instruct", policy(60, 1_000, 10_000, 300_000)),
        ("qwen/qwen3-32b", policy(60, 1_000, 6_000, 500_000)),
    ]
    .into_iter()
    .map(|(model, p)| (model.to_string(), p))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> QuotaPolicy {
        policy(2, 10, 100, 1_000)
    }

    #[test]
    fn zero_usage_admits() {
        assert!(small().evaluate(&QuotaUsed::default()).ok);
    }

    #[test]
    fn ceiling_is_strict() {
        let used = QuotaUsed { rpm: 1, ..Default::default() };
        assert!(small().evaluate(&used).ok);

        let used = QuotaUsed { rpm: 2, ..Default::default() };
        let d = small().evaluate(&used);
        assert!(!d.ok);
        assert_eq!(d.reason, Some(QuotaReason::RpmExceeded));
    }

    #[test]
    fn first_exceeded_ceiling_is_reported() {
        let used = QuotaUsed { rpm: 0, rpd: 10, tpm: 100, tpd: 1_000 };
        assert_eq!(small().evaluate(&used).reason, Some(QuotaReason::RpdExceeded));

        let used = QuotaUsed { rpm: 0, rpd: 0, tpm: 0, tpd: 1_000 };
        assert_eq!(small().evaluate(&used).reason, Some(QuotaReason::TpdExceeded));
    }

    #[test]
    fn unlimited_never_blocks() {
        let p = policy(30, 200, 70_000, -1);
        let used = QuotaUsed { rpm: 0, rpd: 0, tpm: 0, tpd: u64::MAX };
        assert!(p.evaluate(&used).ok);
    }

    #[test]
    fn limit_serde_uses_minus_one_sentinel() {
        let p = builtin_policies()["compound-beta"];
        let json = serde_json::to_value(p).unwrap();
        assert_eq!(json["tpd"], -1);
        assert_eq!(json["rpm"], 15);

        let back: QuotaPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back.tpd, Limit::Unlimited);
    }

    #[test]
    fn limit_rejects_zero_and_other_negatives() {
        assert!(serde_json::from_str::<Limit>("0").is_err());
        assert!(serde_json::from_str::<Limit>("-5").is_err());
        assert_eq!(serde_json::from_str::<Limit>("7").unwrap(), Limit::Max(7));
    }

    #[test]
    fn decision_serializes_reason_code() {
        let json = serde_json::to_value(AdmissionDecision::denied(QuotaReason::TpmExceeded)).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["reason"], "TPM_EXCEEDED");

        let json = serde_json::to_value(AdmissionDecision::admitted()).unwrap();
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn builtin_table_contains_fallback() {
        let table = builtin_policies();
        assert_eq!(table.len(), 17);
        assert!(table.contains_key(FALLBACK_MODEL));
    }
}

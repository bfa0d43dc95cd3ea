use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::quota::{builtin_policies, QuotaPolicy, FALLBACK_MODEL};

/// Per-user, per-model quota configuration.
///
/// Built-in model policies ship with the binary; `models` adds new entries or
/// replaces built-in ones. `users` carries per-user overrides that win over
/// both. A model with no policy at all falls back to `fallback_model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Usage ledger backend.
    #[serde(default)]
    pub store: LedgerBackend,
    /// SQLite database file (only used by the `sqlite` backend).
    #[serde(default = "d_sqlite_path")]
    pub sqlite_path: PathBuf,
    /// Model whose policy applies to models without one.
    #[serde(default = "d_fallback_model")]
    pub fallback_model: String,
    /// Extra or replacement model policies keyed by model id.
    #[serde(default)]
    pub models: BTreeMap<String, QuotaPolicy>,
    /// Per-user overrides: user_id -> model_id -> policy.
    #[serde(default)]
    pub users: HashMap<String, HashMap<String, QuotaPolicy>>,
    /// Usage events older than this many days are purged by the sweep.
    #[serde(default = "d_retention_days")]
    pub retention_days: u32,
    /// Seconds between background retention sweeps. `0` disables the task.
    #[serde(default = "d_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            store: LedgerBackend::default(),
            sqlite_path: d_sqlite_path(),
            fallback_model: d_fallback_model(),
            models: BTreeMap::new(),
            users: HashMap::new(),
            retention_days: d_retention_days(),
            sweep_interval_secs: d_sweep_interval(),
        }
    }
}

impl QuotaConfig {
    /// Built-in policies merged with the configured `models` table.
    pub fn model_policies(&self) -> BTreeMap<String, QuotaPolicy> {
        let mut policies = builtin_policies();
        policies.extend(self.models.iter().map(|(k, v)| (k.clone(), *v)));
        policies
    }
}

/// Where usage events are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Process-local, lost on restart. Intended for tests and local runs.
    Memory,
    #[default]
    Sqlite,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_sqlite_path() -> PathBuf {
    PathBuf::from("./data/usage.db")
}
fn d_fallback_model() -> String {
    FALLBACK_MODEL.into()
}
fn d_retention_days() -> u32 {
    30
}
fn d_sweep_interval() -> u64 {
    3_600
}

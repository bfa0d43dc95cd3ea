use std::sync::Arc;

use cg_domain::config::Config;
use cg_providers::registry::ProviderRegistry;
use cg_tools::ToolRegistry;

use crate::api::auth::UserTokens;
use crate::runtime::quota::QuotaEngine;
use crate::runtime::supervisor::Supervisor;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, LLM providers, tools
/// - **Dispatch & quota**: supervisor, quota engine over the usage ledger
/// - **Security**: bearer-token table
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub llm: Arc<ProviderRegistry>,
    pub tools: Arc<ToolRegistry>,

    // ── Dispatch & quota ──────────────────────────────────────────────
    /// `None` when the default provider failed to initialize; chat then
    /// answers 503 while the quota endpoints keep working.
    pub supervisor: Option<Arc<Supervisor>>,
    pub quota: Arc<QuotaEngine>,

    // ── Security ──────────────────────────────────────────────────────
    pub tokens: Arc<UserTokens>,
}

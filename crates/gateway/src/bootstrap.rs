//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! `serve`, `ask`, `quota` and `sweep` all boot through [`build_app_state`]
//! so the CLI sees exactly the runtime the HTTP server does.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use cg_domain::config::{Config, ConfigSeverity};
use cg_ledger::UsageStore;
use cg_providers::registry::ProviderRegistry;

use crate::api::auth::UserTokens;
use crate::runtime::quota::QuotaEngine;
use crate::runtime::supervisor::Supervisor;
use crate::state::AppState;

/// Log every config issue and fail if any is an error.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    check_config(&config)?;

    // ── LLM providers ────────────────────────────────────────────────
    let llm = ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?;
    if llm.is_empty() {
        tracing::info!("no LLM providers initialized, configure API keys to enable chat");
    } else {
        tracing::info!(providers = llm.len(), "LLM provider registry ready");
    }

    // ── Usage ledger ─────────────────────────────────────────────────
    let store = cg_ledger::open_store(&config.quota)
        .await
        .context("opening usage ledger")?;
    tracing::info!(
        backend = ?config.quota.store,
        persistent = store.is_persistent(),
        "usage ledger ready"
    );

    assemble(config, llm, store)
}

/// Wire an [`AppState`] from already-built parts.
pub fn assemble(
    config: Arc<Config>,
    llm: ProviderRegistry,
    store: Arc<dyn UsageStore>,
) -> anyhow::Result<AppState> {
    // ── Tools ────────────────────────────────────────────────────────
    let tools = cg_tools::builtin_registry();
    tracing::info!(tools = tools.len(), "tool registry ready");

    // ── Supervisor ───────────────────────────────────────────────────
    let supervisor = match llm.get(&config.llm.default_provider) {
        Some(provider) => {
            tracing::info!(
                provider_id = %config.llm.default_provider,
                model = %config.llm.default_model,
                "supervisor ready"
            );
            Some(Arc::new(Supervisor::new(
                provider,
                tools.clone(),
                config.llm.temperature,
            )))
        }
        None => {
            tracing::warn!(
                provider_id = %config.llm.default_provider,
                "default LLM provider unavailable, chat will answer 503"
            );
            None
        }
    };

    // ── Quota engine ─────────────────────────────────────────────────
    let quota = Arc::new(QuotaEngine::new(store, &config.quota));
    tracing::info!(fallback_model = %config.quota.fallback_model, "quota engine ready");

    // ── API tokens (read once, hashed for constant-time comparison) ──
    let tokens = Arc::new(UserTokens::from_config(&config.auth).context("loading API tokens")?);

    Ok(AppState {
        config,
        llm: Arc::new(llm),
        tools: Arc::new(tools),
        supervisor,
        quota,
        tokens,
    })
}

/// Spawn periodic maintenance loops. Each loop is independent of the
/// request path.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic retention sweep ─────────────────────────────────────
    let every = state.config.quota.sweep_interval_secs;
    if every == 0 {
        tracing::info!("usage retention sweep disabled (quota.sweep_interval_secs = 0)");
        return;
    }

    let quota = state.quota.clone();
    let retention_days = state.config.quota.retention_days;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every));
        loop {
            interval.tick().await;
            if let Err(e) = quota.purge_older_than(retention_days, chrono::Utc::now()).await {
                tracing::warn!(error = %e, degraded = true, "usage retention sweep failed");
            }
        }
    });
    tracing::info!(every_secs = every, retention_days, "usage retention sweep scheduled");
}

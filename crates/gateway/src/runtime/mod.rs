//! Core runtime: quota admission, supervisor dispatch and usage recording
//! tied into one request path.
//!
//! Entry point: [`handle_chat`] is shared by `POST /v1/chat` and the `ask`
//! CLI command.

pub mod agents;
pub mod quota;
#[cfg(test)]
pub(crate) mod scripted;
pub mod supervisor;

use chrono::Utc;

use cg_domain::quota::QuotaReason;
use cg_domain::usage::UsageEvent;

use crate::state::AppState;
use agents::AgentId;
use supervisor::DispatchOutcome;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input / errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    pub message: String,
    pub forced_agent: Option<String>,
    pub model: Option<String>,
    /// Recorded on the usage event (e.g. `/v1/chat`, `cli:ask`).
    pub endpoint: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),
    #[error("{}", .0.message())]
    QuotaExceeded(QuotaReason),
    #[error("no LLM provider available")]
    NoProvider,
    #[error("agent invocation failed: {0}")]
    Agent(#[source] cg_domain::Error),
}

fn parse_forced(raw: Option<&str>) -> Result<Option<AgentId>, ChatError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(name) => AgentId::parse(&name.to_lowercase())
            .map(Some)
            .ok_or_else(|| ChatError::UnknownAgent(name.to_string())),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// handle_chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Admit, dispatch and record one chat request for an authenticated user.
///
/// A rejected request is not recorded and consumes no quota. Every attempted
/// dispatch records exactly one usage event; failures are recorded with
/// `success = false` and zero tokens.
pub async fn handle_chat(
    state: &AppState,
    user_id: &str,
    input: ChatInput,
) -> Result<DispatchOutcome, ChatError> {
    if input.message.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    let forced = parse_forced(input.forced_agent.as_deref())?;
    let model = input
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.llm.default_model.clone());

    let decision = state.quota.check_admission(user_id, &model).await;
    if let (false, Some(reason)) = (decision.ok, decision.reason) {
        return Err(ChatError::QuotaExceeded(reason));
    }

    let supervisor = state.supervisor.as_ref().ok_or(ChatError::NoProvider)?;
    let endpoint = input.endpoint.as_deref();

    match supervisor.route(&model, &input.message, forced).await {
        Ok(outcome) => {
            tracing::info!(
                user_id,
                model = %model,
                agent = %outcome.agent_name,
                route = outcome.route.as_str(),
                tokens = outcome.tokens,
                "chat dispatched"
            );
            state
                .quota
                .record_usage(
                    UsageEvent::new(user_id, &model, outcome.tokens, true, Utc::now())
                        .with_agent(outcome.agent_used())
                        .with_endpoint(endpoint),
                )
                .await;
            Ok(outcome)
        }
        Err(e) => {
            tracing::error!(user_id, model = %model, error = %e, "chat dispatch failed");
            state
                .quota
                .record_usage(
                    UsageEvent::new(user_id, &model, 0, false, Utc::now())
                        .with_agent(forced.map(AgentId::as_str))
                        .with_endpoint(endpoint),
                )
                .await;
            Err(ChatError::Agent(e))
        }
    }
}

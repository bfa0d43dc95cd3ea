//! Chat API endpoint, the primary interface for running a supervised turn.
//!
//! - `POST /v1/chat`: admit, dispatch, record usage, return the reply

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::api::auth::AuthUser;
use crate::runtime::agents::AgentId;
use crate::runtime::{handle_chat, ChatError, ChatInput};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    /// User message text.
    pub message: String,
    /// Skip classification and go straight to this agent.
    #[serde(default)]
    pub forced_agent: Option<String>,
    /// Model override. Defaults to `llm.default_model`.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub agent_name: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "Invalid request body",
                    "details": rejection.body_text(),
                })),
            )
                .into_response();
        }
    };
    let input = ChatInput {
        message: body.message,
        forced_agent: body.forced_agent,
        model: body.model,
        endpoint: Some("/v1/chat".into()),
    };

    let span = tracing::info_span!("chat", request_id = %uuid::Uuid::new_v4(), user_id = %user_id);
    match handle_chat(&state, &user_id, input).instrument(span).await {
        Ok(outcome) => Json(ChatReply {
            agent_name: outcome.agent_name,
            response: outcome.response_text,
            tool_used: outcome.tool_used,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: ChatError) -> Response {
    match err {
        ChatError::EmptyMessage => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
        ChatError::UnknownAgent(_) => {
            let known: Vec<&str> = AgentId::ALL.iter().map(|a| a.as_str()).collect();
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": err.to_string(),
                    "details": format!("known agents: {}", known.join(", ")),
                })),
            )
                .into_response()
        }
        ChatError::QuotaExceeded(reason) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": reason.message(),
                "reason": reason.code(),
                "quotaExceeded": true,
            })),
        )
            .into_response(),
        ChatError::NoProvider => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "error": err.to_string(),
                "details": "configure [[llm.providers]] with a valid API key",
            })),
        )
            .into_response(),
        // The full error is logged by `handle_chat`; clients get the kind only.
        ChatError::Agent(source) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": "Error processing request",
                "details": failure_kind(&source),
            })),
        )
            .into_response(),
    }
}

fn failure_kind(err: &cg_domain::error::Error) -> &'static str {
    use cg_domain::error::Error;
    match err {
        Error::Timeout(_) => "model invocation timed out",
        Error::Http(_) | Error::Provider { .. } | Error::Protocol { .. } => {
            "model invocation failed"
        }
        Error::Tool { .. } => "tool execution failed",
        _ => "internal error",
    }
}

pub mod auth;
pub mod chat;
pub mod quota;
pub mod tools;
pub mod usage;

use axum::extract::State;
use axum::middleware;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the bearer-token middleware, which attaches the caller's
/// user id).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let protected = Router::new()
        // Chat (supervisor dispatch)
        .route("/v1/chat", post(chat::chat))
        // Quotas & analytics
        .route("/v1/quotas", get(quota::get_quotas))
        .route("/v1/usage", get(usage::get_usage))
        // Introspection
        .route("/v1/tools", get(tools::list_tools))
        .route("/v1/agents", get(tools::list_agents))
        .route_layer(middleware::from_fn_with_state(state, auth::require_user));

    public.merge(protected)
}

/// `GET /health`: liveness plus a coarse readiness summary.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": state.llm.list_providers(),
        "chatReady": state.supervisor.is_some(),
        "ledgerPersistent": state.quota.store().is_persistent(),
    }))
}

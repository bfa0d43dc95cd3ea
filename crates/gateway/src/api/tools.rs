//! Tool and agent listing.
//!
//! - `GET /v1/tools`: tool definitions from the registry
//! - `GET /v1/agents`: agent ids with the tool each is bound to

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::runtime::agents::AgentId;
use crate::state::AppState;

pub async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "tools": state.tools.list() }))
}

pub async fn list_agents() -> impl IntoResponse {
    let agents: Vec<_> = AgentId::ALL
        .iter()
        .map(|a| {
            serde_json::json!({
                "id": a.as_str(),
                "description": a.description(),
                "tool": a.tool_name(),
            })
        })
        .collect();
    Json(serde_json::json!({ "agents": agents }))
}

//! Quota introspection API endpoint.
//!
//! - `GET /v1/quotas?modelId=`: one model's status, or a `modelId -> status`
//!   map over every known model

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde::Deserialize;

use crate::api::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaQuery {
    #[serde(default)]
    pub model_id: Option<String>,
}

/// `GET /v1/quotas`: current window usage and resolved limits for the caller.
pub async fn get_quotas(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<QuotaQuery>,
) -> impl IntoResponse {
    match query.model_id.filter(|m| !m.is_empty()) {
        Some(model) => {
            let status = state.quota.quota_status(&user_id, &model).await;
            Json(serde_json::to_value(status).unwrap_or_default())
        }
        None => {
            let statuses = state.quota.all_quota_statuses(&user_id).await;
            Json(serde_json::to_value(statuses).unwrap_or_default())
        }
    }
}

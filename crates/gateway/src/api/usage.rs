//! Usage analytics endpoint.
//!
//! - `GET /v1/usage?modelId=&range=`: totals and success rate over 1h/24h/7d/30d

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde::Deserialize;

use cg_domain::usage::StatsRange;

use crate::api::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuery {
    #[serde(default)]
    pub model_id: Option<String>,
    /// `1h`, `24h`, `7d` or `30d`; anything else means `24h`.
    #[serde(default)]
    pub range: Option<String>,
}

pub async fn get_usage(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<UsageQuery>,
) -> impl IntoResponse {
    let range = StatsRange::parse_or_default(query.range.as_deref());
    let model = query.model_id.as_deref().filter(|m| !m.is_empty());
    let stats = state.quota.usage_stats(&user_id, model, range).await;

    Json(serde_json::json!({
        "userId": user_id,
        "modelId": model,
        "range": range,
        "totalRequests": stats.total_requests,
        "totalTokens": stats.total_tokens,
        "successRate": stats.success_rate,
    }))
}

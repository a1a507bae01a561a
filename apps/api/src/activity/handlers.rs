use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::activity;
use crate::errors::AppError;
use crate::models::activity::{ActivityRecord, ActivityType};
use crate::session::guard::CurrentPrincipal;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LogRequest {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

/// POST /api/v1/activity
///
/// The `logActivity` surface. Always reports success: audit writes are
/// best-effort and must never fail the action that triggered them.
pub async fn handle_log(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
    Json(req): Json<LogRequest>,
) -> Json<Value> {
    activity::record(
        state.store.as_ref(),
        session.id,
        req.activity_type,
        &req.title,
        req.description,
        req.metadata,
    )
    .await;
    Json(json!({ "success": true }))
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/activity?limit=
pub async fn handle_recent(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<ActivityRecord>>, AppError> {
    let records = activity::recent(state.store.as_ref(), session.id, query.limit).await?;
    Ok(Json(records))
}

/// GET /api/v1/activity/summary
///
/// Per-type counts over the rolling 30-day window.
pub async fn handle_summary(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
) -> Result<Json<Value>, AppError> {
    let counts = activity::summary(state.store.as_ref(), session.id).await?;
    let by_type: BTreeMap<&'static str, i64> = counts
        .into_iter()
        .map(|(t, n)| (t.as_str(), n))
        .collect();
    Ok(Json(json!({
        "windowDays": activity::SUMMARY_WINDOW_DAYS,
        "counts": by_type,
    })))
}

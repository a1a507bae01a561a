//! Append-only audit log of security-relevant events.
//!
//! This is the audit trail — incidental `tracing` output is not. Recording
//! is fire-and-forget: a failed insert is logged server-side and never fails
//! or surfaces in the action that triggered it.

pub mod handlers;

use chrono::{Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::models::activity::{ActivityRecord, ActivityType, NewActivityRecord};
use crate::store::{IdentityStore, StoreResult};

pub const RETENTION_DAYS: i64 = 90;
pub const SUMMARY_WINDOW_DAYS: i64 = 30;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// Appends one record. Infallible from the caller's point of view.
pub async fn record(
    store: &dyn IdentityStore,
    principal_id: Uuid,
    activity_type: ActivityType,
    title: &str,
    description: Option<String>,
    metadata: serde_json::Value,
) {
    let result = store
        .insert_activity(NewActivityRecord {
            principal_id,
            activity_type,
            title: title.to_string(),
            description,
            metadata,
        })
        .await;
    if let Err(e) = result {
        warn!("Failed to record {activity_type} activity: {e}");
    }
}

/// The most recent records for a principal, newest first.
pub async fn recent(
    store: &dyn IdentityStore,
    principal_id: Uuid,
    limit: Option<i64>,
) -> StoreResult<Vec<ActivityRecord>> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    store.recent_activity(principal_id, limit).await
}

/// Per-type counts over the rolling 30-day window.
pub async fn summary(
    store: &dyn IdentityStore,
    principal_id: Uuid,
) -> StoreResult<Vec<(ActivityType, i64)>> {
    let since = Utc::now() - Duration::days(SUMMARY_WINDOW_DAYS);
    store.activity_counts_since(principal_id, since).await
}

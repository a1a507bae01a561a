//! Periodic hygiene: expired verification tokens, abandoned unverified
//! registrations and aged-out activity records. Invoked as a one-shot pass
//! (`api sweep`), typically from a scheduler.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;

use crate::activity::RETENTION_DAYS;
use crate::store::IdentityStore;
use crate::verification::TOKEN_TTL_HOURS;

/// Unverified local registrations older than this are considered abandoned.
/// Matches the token TTL: once the last possible token has expired the
/// account can never be verified.
pub const STALE_UNVERIFIED_HOURS: i64 = TOKEN_TTL_HOURS;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_tokens: u64,
    pub stale_principals: u64,
    pub aged_activity: u64,
}

/// One full sweep pass. Each category is independent; a later deletion still
/// runs if an earlier one finds nothing.
pub async fn run(store: &dyn IdentityStore) -> Result<SweepReport> {
    let now = Utc::now();

    let expired_tokens = store.delete_expired_tokens(now).await?;
    let stale_principals = store
        .delete_stale_unverified_principals(now - Duration::hours(STALE_UNVERIFIED_HOURS))
        .await?;
    let aged_activity = store
        .delete_activity_before(now - Duration::days(RETENTION_DAYS))
        .await?;

    let report = SweepReport {
        expired_tokens,
        stale_principals,
        aged_activity,
    };
    info!(
        expired_tokens = report.expired_tokens,
        stale_principals = report.stale_principals,
        aged_activity = report.aged_activity,
        "Sweep pass complete"
    );
    Ok(report)
}

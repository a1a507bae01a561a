//! Storage access for the identity core.
//!
//! Everything that touches the relational store goes through the
//! [`IdentityStore`] trait so the sign-in state machine, token ledger,
//! two-factor manager and sweeper can be exercised against an in-memory
//! implementation in tests. The production implementation is [`PgStore`].

pub mod pg;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::activity::{ActivityRecord, ActivityType, NewActivityRecord};
use crate::models::principal::{LinkedIdentity, NewPrincipal, Principal};
use crate::models::token::VerificationToken;

pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint violation; surfaces as a user-facing CONFLICT.
    /// This is how a lost duplicate-registration race is reported.
    #[error("duplicate row")]
    Duplicate,

    /// A row that cannot be decoded into its model type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Everything else: connection loss, timeouts, pool exhaustion.
    #[error(transparent)]
    Unavailable(sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e {
            if db.is_unique_violation() {
                return StoreError::Duplicate;
            }
        }
        StoreError::Unavailable(e)
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    // Principals
    async fn create_principal(&self, new: NewPrincipal) -> StoreResult<Principal>;
    async fn principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>>;
    async fn principal_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>>;
    async fn update_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()>;
    /// Returns whether a principal row was actually updated.
    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> StoreResult<bool>;
    async fn set_two_factor(
        &self,
        id: Uuid,
        secret: Option<&str>,
        enabled: bool,
    ) -> StoreResult<()>;
    /// Volatile claim source for session enrichment.
    async fn image_url(&self, id: Uuid) -> StoreResult<Option<String>>;

    // Linked identities
    /// Idempotent: returns true when a new link was created, false when the
    /// (provider, subject) pair was already bound.
    async fn link_identity(
        &self,
        provider: &str,
        subject: &str,
        principal_id: Uuid,
    ) -> StoreResult<bool>;
    async fn linked_identities(&self, principal_id: Uuid) -> StoreResult<Vec<LinkedIdentity>>;

    // Verification tokens
    async fn insert_verification_token(&self, token: &VerificationToken) -> StoreResult<()>;
    async fn delete_tokens_for_email(&self, email: &str) -> StoreResult<u64>;
    /// Atomically removes and returns the token row, making consumption
    /// at-most-once by construction.
    async fn take_verification_token(&self, token: &str)
        -> StoreResult<Option<VerificationToken>>;

    // Activity
    async fn insert_activity(&self, rec: NewActivityRecord) -> StoreResult<ActivityRecord>;
    async fn recent_activity(
        &self,
        principal_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ActivityRecord>>;
    async fn activity_counts_since(
        &self,
        principal_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<(ActivityType, i64)>>;

    // Starter resource
    async fn create_resume(&self, principal_id: Uuid, title: &str) -> StoreResult<Uuid>;
    async fn has_any_resume(&self, principal_id: Uuid) -> StoreResult<bool>;

    // Sweeper
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64>;
    async fn delete_stale_unverified_principals(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
    async fn delete_activity_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

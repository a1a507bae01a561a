//! PostgreSQL implementation of [`IdentityStore`].
//!
//! Queries are plain bound statements; the unique constraint on
//! `principals.email` and the composite key on `linked_identities` do the
//! concurrency heavy lifting (see `StoreError::Duplicate`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::activity::{ActivityRecord, ActivityType, NewActivityRecord};
use crate::models::principal::{LinkedIdentity, NewPrincipal, Principal};
use crate::models::token::VerificationToken;
use crate::store::{IdentityStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw activity row; `activity_type` is text in the store and parsed into
/// the closed enum on the way out.
#[derive(FromRow)]
struct ActivityRow {
    id: Uuid,
    principal_id: Uuid,
    activity_type: String,
    title: String,
    description: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityRecord {
    type Error = StoreError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let activity_type: ActivityType =
            row.activity_type.parse().map_err(StoreError::Corrupt)?;
        Ok(ActivityRecord {
            id: row.id,
            principal_id: row.principal_id,
            activity_type,
            title: row.title,
            description: row.description,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn create_principal(&self, new: NewPrincipal) -> StoreResult<Principal> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            INSERT INTO principals (id, email, name, password_hash, email_verified, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.password_hash)
        .bind(new.email_verified)
        .bind(&new.image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(principal)
    }

    async fn principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        Ok(
            sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn principal_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        Ok(
            sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE principals SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE principals SET email_verified = $2, updated_at = now() WHERE email = $1")
                .bind(email)
                .bind(at)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_two_factor(
        &self,
        id: Uuid,
        secret: Option<&str>,
        enabled: bool,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE principals
            SET two_factor_secret = $2, two_factor_enabled = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(secret)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn image_url(&self, id: Uuid) -> StoreResult<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT image_url FROM principals WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(url,)| url))
    }

    async fn link_identity(
        &self,
        provider: &str,
        subject: &str,
        principal_id: Uuid,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO linked_identities (provider, subject, principal_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, subject) DO NOTHING
            "#,
        )
        .bind(provider)
        .bind(subject)
        .bind(principal_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn linked_identities(&self, principal_id: Uuid) -> StoreResult<Vec<LinkedIdentity>> {
        Ok(sqlx::query_as::<_, LinkedIdentity>(
            "SELECT * FROM linked_identities WHERE principal_id = $1",
        )
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_verification_token(&self, token: &VerificationToken) -> StoreResult<()> {
        sqlx::query("INSERT INTO verification_tokens (token, email, expires_at) VALUES ($1, $2, $3)")
            .bind(&token.token)
            .bind(&token.email)
            .bind(token.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_tokens_for_email(&self, email: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn take_verification_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<VerificationToken>> {
        // DELETE ... RETURNING makes the consumption atomic: of two racing
        // requests with the same token string, exactly one gets the row.
        Ok(sqlx::query_as::<_, VerificationToken>(
            "DELETE FROM verification_tokens WHERE token = $1 RETURNING token, email, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_activity(&self, rec: NewActivityRecord) -> StoreResult<ActivityRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO activity_records
                (id, principal_id, activity_type, title, description, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(rec.principal_id)
        .bind(rec.activity_type.as_str())
        .bind(&rec.title)
        .bind(&rec.description)
        .bind(&rec.metadata)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ActivityRecord {
            id,
            principal_id: rec.principal_id,
            activity_type: rec.activity_type,
            title: rec.title,
            description: rec.description,
            metadata: rec.metadata,
            created_at: now,
        })
    }

    async fn recent_activity(
        &self,
        principal_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ActivityRecord>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, principal_id, activity_type, title, description, metadata, created_at
            FROM activity_records
            WHERE principal_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(principal_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActivityRecord::try_from).collect()
    }

    async fn activity_counts_since(
        &self,
        principal_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<(ActivityType, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT activity_type, COUNT(*)
            FROM activity_records
            WHERE principal_id = $1 AND created_at >= $2
            GROUP BY activity_type
            "#,
        )
        .bind(principal_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(t, n)| {
                t.parse::<ActivityType>()
                    .map(|t| (t, n))
                    .map_err(StoreError::Corrupt)
            })
            .collect()
    }

    async fn create_resume(&self, principal_id: Uuid, title: &str) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO resumes (id, principal_id, title) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(principal_id)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn has_any_resume(&self, principal_id: Uuid) -> StoreResult<bool> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM resumes WHERE principal_id = $1 LIMIT 1")
                .bind(principal_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_stale_unverified_principals(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        // Scoped to local registrations that never completed verification.
        // Verified principals and pure-federated accounts are untouchable
        // here regardless of age.
        let result = sqlx::query(
            r#"
            DELETE FROM principals
            WHERE password_hash IS NOT NULL
              AND email_verified IS NULL
              AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_activity_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM activity_records WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

//! In-memory [`IdentityStore`] for unit tests.
//!
//! Mirrors the constraints the Postgres schema enforces: unique normalized
//! email, unique (provider, subject), atomic token take.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::activity::{ActivityRecord, ActivityType, NewActivityRecord};
use crate::models::principal::{LinkedIdentity, NewPrincipal, Principal};
use crate::models::token::VerificationToken;
use crate::store::{IdentityStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    principals: Vec<Principal>,
    identities: Vec<LinkedIdentity>,
    tokens: Vec<VerificationToken>,
    activity: Vec<ActivityRecord>,
    resumes: Vec<(Uuid, Uuid)>, // (resume id, principal id)
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store outage; every call fails until flipped back.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    /// Test helper: rewind a principal's creation time.
    pub fn backdate_principal(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.principals.iter_mut().find(|p| p.id == id) {
            p.created_at = created_at;
        }
    }

    /// Test helper: rewind an activity record.
    pub fn backdate_activity(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(r) = inner.activity.iter_mut().find(|r| r.id == id) {
            r.created_at = created_at;
        }
    }

    /// Test helper: set the live image for enrichment assertions.
    pub fn set_image_url(&self, id: Uuid, url: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.principals.iter_mut().find(|p| p.id == id) {
            p.image_url = url;
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn create_principal(&self, new: NewPrincipal) -> StoreResult<Principal> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.principals.iter().any(|p| p.email == new.email) {
            return Err(StoreError::Duplicate);
        }
        let now = Utc::now();
        let principal = Principal {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            password_hash: new.password_hash,
            email_verified: new.email_verified,
            image_url: new.image_url,
            two_factor_secret: None,
            two_factor_enabled: false,
            locale: "en".to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.principals.push(principal.clone());
        Ok(principal)
    }

    async fn principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.principals.iter().find(|p| p.email == email).cloned())
    }

    async fn principal_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.principals.iter().find(|p| p.id == id).cloned())
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.principals.iter_mut().find(|p| p.id == id) {
            p.password_hash = Some(hash.to_string());
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.principals.iter_mut().find(|p| p.email == email) {
            Some(p) => {
                p.email_verified = Some(at);
                p.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_two_factor(
        &self,
        id: Uuid,
        secret: Option<&str>,
        enabled: bool,
    ) -> StoreResult<()> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.principals.iter_mut().find(|p| p.id == id) {
            p.two_factor_secret = secret.map(|s| s.to_string());
            p.two_factor_enabled = enabled;
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn image_url(&self, id: Uuid) -> StoreResult<Option<String>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .principals
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.image_url.clone()))
    }

    async fn link_identity(
        &self,
        provider: &str,
        subject: &str,
        principal_id: Uuid,
    ) -> StoreResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        if inner
            .identities
            .iter()
            .any(|l| l.provider == provider && l.subject == subject)
        {
            return Ok(false);
        }
        inner.identities.push(LinkedIdentity {
            provider: provider.to_string(),
            subject: subject.to_string(),
            principal_id,
        });
        Ok(true)
    }

    async fn linked_identities(&self, principal_id: Uuid) -> StoreResult<Vec<LinkedIdentity>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .identities
            .iter()
            .filter(|l| l.principal_id == principal_id)
            .cloned()
            .collect())
    }

    async fn insert_verification_token(&self, token: &VerificationToken) -> StoreResult<()> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.tokens.iter().any(|t| t.token == token.token) {
            return Err(StoreError::Duplicate);
        }
        inner.tokens.push(token.clone());
        Ok(())
    }

    async fn delete_tokens_for_email(&self, email: &str) -> StoreResult<u64> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.tokens.len();
        inner.tokens.retain(|t| t.email != email);
        Ok((before - inner.tokens.len()) as u64)
    }

    async fn take_verification_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<VerificationToken>> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.tokens.iter().position(|t| t.token == token) {
            Some(idx) => Ok(Some(inner.tokens.remove(idx))),
            None => Ok(None),
        }
    }

    async fn insert_activity(&self, rec: NewActivityRecord) -> StoreResult<ActivityRecord> {
        self.check()?;
        let record = ActivityRecord {
            id: Uuid::new_v4(),
            principal_id: rec.principal_id,
            activity_type: rec.activity_type,
            title: rec.title,
            description: rec.description,
            metadata: rec.metadata,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().activity.push(record.clone());
        Ok(record)
    }

    async fn recent_activity(
        &self,
        principal_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ActivityRecord>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<ActivityRecord> = inner
            .activity
            .iter()
            .filter(|r| r.principal_id == principal_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn activity_counts_since(
        &self,
        principal_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<(ActivityType, i64)>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        let mut counts: Vec<(ActivityType, i64)> = Vec::new();
        for r in inner
            .activity
            .iter()
            .filter(|r| r.principal_id == principal_id && r.created_at >= since)
        {
            match counts.iter_mut().find(|(t, _)| *t == r.activity_type) {
                Some((_, n)) => *n += 1,
                None => counts.push((r.activity_type, 1)),
            }
        }
        Ok(counts)
    }

    async fn create_resume(&self, principal_id: Uuid, _title: &str) -> StoreResult<Uuid> {
        self.check()?;
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().resumes.push((id, principal_id));
        Ok(id)
    }

    async fn has_any_resume(&self, principal_id: Uuid) -> StoreResult<bool> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.resumes.iter().any(|(_, p)| *p == principal_id))
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.tokens.len();
        inner.tokens.retain(|t| t.expires_at >= now);
        Ok((before - inner.tokens.len()) as u64)
    }

    async fn delete_stale_unverified_principals(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.principals.len();
        inner.principals.retain(|p| {
            !(p.password_hash.is_some() && p.email_verified.is_none() && p.created_at < cutoff)
        });
        Ok((before - inner.principals.len()) as u64)
    }

    async fn delete_activity_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.activity.len();
        inner.activity.retain(|r| r.created_at >= cutoff);
        Ok((before - inner.activity.len()) as u64)
    }
}

//! Two-factor state machine: DISABLED → SECRET_GENERATED → ENABLED → DISABLED.
//!
//! The SECRET_GENERATED state lives entirely client-side: nothing touches the
//! store until a rolling code proves the user enrolled the secret. Abandoning
//! setup, or generating again, simply discards the earlier secret.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::activity;
use crate::errors::AppError;
use crate::models::activity::ActivityType;
use crate::store::IdentityStore;
use crate::twofactor::totp;

/// Issuer label shown in authenticator apps.
pub const OTP_ISSUER: &str = "CVBuilder";

pub struct EnrollmentPayload {
    pub secret: String,
    pub otpauth_url: String,
}

/// Produces a fresh secret and its enrollment URI. Persists nothing.
pub fn generate_secret(account_email: &str) -> EnrollmentPayload {
    let secret = totp::generate_secret();
    let otpauth_url = totp::otpauth_uri(&secret, account_email, OTP_ISSUER);
    EnrollmentPayload { secret, otpauth_url }
}

/// Confirms enrollment: only a valid code for the just-generated secret
/// persists it and flips the enabled flag. Returns false on a mismatch,
/// leaving the principal untouched so the user can retry.
pub async fn enable(
    store: &dyn IdentityStore,
    principal_id: Uuid,
    secret: &str,
    code: &str,
) -> Result<bool, AppError> {
    if !totp::verify(secret, code, Utc::now().timestamp()) {
        return Ok(false);
    }
    store
        .set_two_factor(principal_id, Some(secret), true)
        .await?;
    activity::record(
        store,
        principal_id,
        ActivityType::TwoFactorEnabled,
        "Two-factor authentication enabled",
        None,
        json!({}),
    )
    .await;
    Ok(true)
}

/// Clears secret and flag unconditionally for the authenticated principal.
/// No re-proof of the password or a current code is demanded — deliberate
/// friction-reduction or an oversight, undecided upstream; we mirror it.
pub async fn disable(store: &dyn IdentityStore, principal_id: Uuid) -> Result<(), AppError> {
    store.set_two_factor(principal_id, None, false).await?;
    activity::record(
        store,
        principal_id,
        ActivityType::TwoFactorDisabled,
        "Two-factor authentication disabled",
        None,
        json!({}),
    )
    .await;
    Ok(())
}

/// Stateless check against the persisted secret. False when no secret is
/// enrolled.
pub async fn verify_code(
    store: &dyn IdentityStore,
    principal_id: Uuid,
    code: &str,
) -> Result<bool, AppError> {
    let principal = store
        .principal_by_id(principal_id)
        .await?
        .ok_or(AppError::NotAuthorized)?;
    let Some(secret) = principal.two_factor_secret.as_deref() else {
        return Ok(false);
    };
    Ok(totp::verify(secret, code, Utc::now().timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::principal::NewPrincipal;
    use crate::store::memory::MemoryStore;

    async fn seed(store: &MemoryStore) -> Uuid {
        store
            .create_principal(NewPrincipal {
                email: "ana@x.com".to_string(),
                name: "Ana".to_string(),
                password_hash: Some("$argon2id$stub".to_string()),
                email_verified: Some(Utc::now()),
                image_url: None,
            })
            .await
            .unwrap()
            .id
    }

    fn current_code(secret: &str) -> String {
        totp::code_at(secret, Utc::now().timestamp()).unwrap()
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = MemoryStore::new();
        let id = seed(&store).await;

        let payload = generate_secret("ana@x.com");
        assert!(payload.otpauth_url.contains(&payload.secret));

        // Nothing persisted yet.
        let p = store.principal_by_id(id).await.unwrap().unwrap();
        assert!(p.two_factor_secret.is_none());
        assert!(!p.two_factor_enabled);

        assert!(enable(&store, id, &payload.secret, &current_code(&payload.secret))
            .await
            .unwrap());
        let p = store.principal_by_id(id).await.unwrap().unwrap();
        assert_eq!(p.two_factor_secret.as_deref(), Some(payload.secret.as_str()));
        assert!(p.two_factor_enabled);

        assert!(verify_code(&store, id, &current_code(&payload.secret))
            .await
            .unwrap());

        disable(&store, id).await.unwrap();
        let p = store.principal_by_id(id).await.unwrap().unwrap();
        assert!(p.two_factor_secret.is_none());
        assert!(!p.two_factor_enabled);
    }

    #[tokio::test]
    async fn test_wrong_code_persists_nothing() {
        let store = MemoryStore::new();
        let id = seed(&store).await;

        let payload = generate_secret("ana@x.com");
        assert!(!enable(&store, id, &payload.secret, "000000").await.unwrap());

        let p = store.principal_by_id(id).await.unwrap().unwrap();
        assert!(p.two_factor_secret.is_none());
        assert!(!p.two_factor_enabled);
    }

    #[tokio::test]
    async fn test_regenerating_discards_the_earlier_secret() {
        let store = MemoryStore::new();
        let id = seed(&store).await;

        let first = generate_secret("ana@x.com");
        let second = generate_secret("ana@x.com");
        assert_ne!(first.secret, second.secret);

        // Enrolling the second works; the first was never persisted and a
        // code for it no longer matters once the second is enabled.
        assert!(enable(&store, id, &second.secret, &current_code(&second.secret))
            .await
            .unwrap());
        assert!(!verify_code(&store, id, &current_code(&first.secret))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_verify_without_enrollment_is_false() {
        let store = MemoryStore::new();
        let id = seed(&store).await;
        assert!(!verify_code(&store, id, "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_enable_and_disable_leave_audit_records() {
        let store = MemoryStore::new();
        let id = seed(&store).await;
        let payload = generate_secret("ana@x.com");
        enable(&store, id, &payload.secret, &current_code(&payload.secret))
            .await
            .unwrap();
        disable(&store, id).await.unwrap();

        let records = crate::activity::recent(&store, id, Some(10)).await.unwrap();
        let types: Vec<_> = records.iter().map(|r| r.activity_type).collect();
        assert!(types.contains(&ActivityType::TwoFactorEnabled));
        assert!(types.contains(&ActivityType::TwoFactorDisabled));
    }
}

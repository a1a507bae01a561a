//! Identity reconciliation: resolving a sign-in attempt, local or federated,
//! into exactly one canonical principal.

use chrono::Utc;
use tracing::{info, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::policy::{
    self, normalize_email, validate_registration, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN,
};
use crate::errors::AppError;
use crate::mail::Mailer;
use crate::models::principal::{NewPrincipal, PrincipalSummary};
use crate::store::{IdentityStore, StoreError};
use crate::verification;

/// Local sign-in state machine.
///
/// Everything except the unverified state collapses into `AuthFailed`:
/// unknown email, federated-only account and wrong password are
/// indistinguishable from the outside. The unverified state is reported
/// separately so the client can offer a resend action.
///
/// Note: this step never consults the two-factor manager; an enabled rolling
/// code currently has no effect on local sign-in. Known gap, kept as-is.
pub async fn authorize_local(
    store: &dyn IdentityStore,
    email: &str,
    password: &str,
) -> Result<PrincipalSummary, AppError> {
    // Shape checks first: malformed input never reaches the store.
    if !policy::email_shape_ok(email) {
        return Err(AppError::AuthFailed);
    }
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN || len > PASSWORD_MAX_LEN {
        return Err(AppError::AuthFailed);
    }

    let email = normalize_email(email);
    let principal = store
        .principal_by_email(&email)
        .await?
        .ok_or(AppError::AuthFailed)?;

    // A pure-federated account holds no password to check against.
    let Some(hash) = principal.password_hash.as_deref() else {
        return Err(AppError::AuthFailed);
    };

    if principal.email_verified.is_none() {
        return Err(AppError::EmailNotVerified);
    }

    if !verify_password(password, hash)? {
        warn!("Failed sign-in attempt for an existing account");
        return Err(AppError::AuthFailed);
    }

    Ok(PrincipalSummary::from(&principal))
}

pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Registers a local principal: validate → hash → insert → starter resource
/// → verification mail. A duplicate email, including one lost to a
/// concurrent registration, surfaces as `Conflict`.
pub async fn register(
    store: &dyn IdentityStore,
    mailer: &dyn Mailer,
    app_base_url: &str,
    form: RegistrationForm,
) -> Result<PrincipalSummary, AppError> {
    let errors = validate_registration(
        &form.name,
        &form.email,
        &form.password,
        &form.confirm_password,
    );
    if !errors.is_empty() {
        return Err(AppError::FieldValidation(errors));
    }

    let email = normalize_email(&form.email);
    let password_hash = hash_password(&form.password)?;

    let principal = store
        .create_principal(NewPrincipal {
            email: email.clone(),
            name: form.name.trim().to_string(),
            password_hash: Some(password_hash),
            email_verified: None,
            image_url: None,
        })
        .await?;

    // Local registrations get their starter resume synchronously.
    crate::resources::issue_default_resume(store, principal.id).await?;

    verification::issue_and_send(store, mailer, app_base_url, &email).await?;

    info!(principal_id = %principal.id, "Registered new principal");
    Ok(PrincipalSummary::from(&principal))
}

/// Profile facts asserted by a federated provider after its own token
/// exchange. The email is provider-verified by the time it reaches us.
pub struct FederatedProfile {
    pub provider: String,
    pub subject: String,
    pub email: String,
    pub name: String,
    pub image_url: Option<String>,
}

/// Federated reconciliation: one canonical principal per email, any number
/// of linked identities, never a duplicate link for the same
/// (provider, subject) pair.
///
/// New federated principals are created implicitly verified — the provider
/// proved email ownership — and do NOT get a starter resource here; that is
/// provisioned lazily on a later authenticated read. Callers must treat a
/// zero-resource principal as valid during that window.
pub async fn reconcile_federated(
    store: &dyn IdentityStore,
    profile: FederatedProfile,
) -> Result<PrincipalSummary, AppError> {
    let email = normalize_email(&profile.email);

    let principal = match store.principal_by_email(&email).await? {
        Some(existing) => existing,
        None => {
            let created = store
                .create_principal(NewPrincipal {
                    email: email.clone(),
                    name: profile.name.clone(),
                    password_hash: None,
                    email_verified: Some(Utc::now()),
                    image_url: profile.image_url.clone(),
                })
                .await;
            match created {
                Ok(p) => p,
                // Lost a first-sight race against a concurrent sign-in with
                // the same email; the winner's row is the canonical one.
                Err(StoreError::Duplicate) => store
                    .principal_by_email(&email)
                    .await?
                    .ok_or(AppError::AuthFailed)?,
                Err(e) => return Err(e.into()),
            }
        }
    };

    let created_link = store
        .link_identity(&profile.provider, &profile.subject, principal.id)
        .await?;
    if created_link {
        info!(
            principal_id = %principal.id,
            provider = %profile.provider,
            "Linked federated identity"
        );
    }

    Ok(PrincipalSummary::from(&principal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::Mailer;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;

    struct NoopMailer;

    #[async_trait]
    impl Mailer for NoopMailer {
        async fn send_verification(&self, _to: &str, _verify_url: &str) {}
    }

    fn ana_form() -> RegistrationForm {
        RegistrationForm {
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            password: "Abcd1234".to_string(),
            confirm_password: "Abcd1234".to_string(),
        }
    }

    async fn register_ana(store: &MemoryStore) -> PrincipalSummary {
        register(store, &NoopMailer, "http://localhost:3000", ana_form())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_registration_scenario() {
        let store = MemoryStore::new();
        let summary = register_ana(&store).await;

        assert_eq!(summary.name, "Ana");
        assert_eq!(summary.email, "ana@x.com");

        let stored = store.principal_by_email("ana@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash.as_deref(), Some("Abcd1234"));
        assert!(stored.email_verified.is_none());
        // Starter resource is synchronous for local registrations.
        assert!(store.has_any_resume(stored.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_blocked_until_verified_then_succeeds() {
        let store = MemoryStore::new();
        register_ana(&store).await;

        let before = authorize_local(&store, "ana@x.com", "Abcd1234").await;
        assert!(matches!(before, Err(AppError::EmailNotVerified)));

        store
            .mark_email_verified("ana@x.com", Utc::now())
            .await
            .unwrap();

        let after = authorize_local(&store, "ana@x.com", "Abcd1234").await.unwrap();
        assert_eq!(after.name, "Ana");
        assert_eq!(after.email, "ana@x.com");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
        let store = MemoryStore::new();
        register_ana(&store).await;
        store
            .mark_email_verified("ana@x.com", Utc::now())
            .await
            .unwrap();

        let wrong_pw = authorize_local(&store, "ana@x.com", "Abcd1235").await;
        let unknown = authorize_local(&store, "bob@x.com", "Abcd1234").await;
        assert!(matches!(wrong_pw, Err(AppError::AuthFailed)));
        assert!(matches!(unknown, Err(AppError::AuthFailed)));
    }

    #[tokio::test]
    async fn test_federated_only_account_cannot_sign_in_locally() {
        let store = MemoryStore::new();
        reconcile_federated(
            &store,
            FederatedProfile {
                provider: "google".to_string(),
                subject: "g-123".to_string(),
                email: "ana@x.com".to_string(),
                name: "Ana".to_string(),
                image_url: None,
            },
        )
        .await
        .unwrap();

        let result = authorize_local(&store, "ana@x.com", "Abcd1234").await;
        assert!(matches!(result, Err(AppError::AuthFailed)));
    }

    #[tokio::test]
    async fn test_malformed_input_fails_without_store_access() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        // If either call touched the store this would be a Store error.
        let bad_email = authorize_local(&store, "not-an-email", "Abcd1234").await;
        let bad_password = authorize_local(&store, "ana@x.com", "x").await;
        assert!(matches!(bad_email, Err(AppError::AuthFailed)));
        assert!(matches!(bad_password, Err(AppError::AuthFailed)));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let store = MemoryStore::new();
        register_ana(&store).await;

        let second = register(&store, &NoopMailer, "http://localhost:3000", ana_form()).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_email_lookup_is_normalized() {
        let store = MemoryStore::new();
        register_ana(&store).await;
        store
            .mark_email_verified("ana@x.com", Utc::now())
            .await
            .unwrap();

        let summary = authorize_local(&store, "  Ana@X.com ", "Abcd1234").await.unwrap();
        assert_eq!(summary.email, "ana@x.com");
    }

    #[tokio::test]
    async fn test_federated_first_sight_creates_verified_principal_lazily_resourced() {
        let store = MemoryStore::new();
        let summary = reconcile_federated(
            &store,
            FederatedProfile {
                provider: "github".to_string(),
                subject: "gh-9".to_string(),
                email: "dev@x.com".to_string(),
                name: "Dev".to_string(),
                image_url: Some("https://avatars.example/dev.png".to_string()),
            },
        )
        .await
        .unwrap();

        let stored = store.principal_by_id(summary.id).await.unwrap().unwrap();
        assert!(stored.email_verified.is_some());
        assert!(stored.password_hash.is_none());
        // Zero-resource window is valid state, not an error.
        assert!(!store.has_any_resume(stored.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_repeat_federated_sign_in_never_duplicates_link() {
        let store = MemoryStore::new();
        let profile = || FederatedProfile {
            provider: "google".to_string(),
            subject: "g-42".to_string(),
            email: "ana@x.com".to_string(),
            name: "Ana".to_string(),
            image_url: None,
        };

        let first = reconcile_federated(&store, profile()).await.unwrap();
        let second = reconcile_federated(&store, profile()).await.unwrap();
        assert_eq!(first.id, second.id);

        let links = store.linked_identities(first.id).await.unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn test_federated_links_onto_existing_local_account() {
        let store = MemoryStore::new();
        let local = register_ana(&store).await;

        let federated = reconcile_federated(
            &store,
            FederatedProfile {
                provider: "google".to_string(),
                subject: "g-1".to_string(),
                email: "ana@x.com".to_string(),
                name: "Ana G".to_string(),
                image_url: None,
            },
        )
        .await
        .unwrap();

        // Same canonical principal, no duplicate created.
        assert_eq!(local.id, federated.id);
        let links = store.linked_identities(local.id).await.unwrap();
        assert_eq!(links.len(), 1);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A full principal row. Never serialized to clients as-is; the password
/// hash and two-factor secret must not leave the server.
#[derive(Debug, Clone, FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub two_factor_secret: Option<String>,
    pub two_factor_enabled: bool,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The client-facing view of a principal: exactly {id, name, email}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&Principal> for PrincipalSummary {
    fn from(p: &Principal) -> Self {
        PrincipalSummary {
            id: p.id,
            name: p.name.clone(),
            email: p.email.clone(),
        }
    }
}

/// Insert payload for a new principal.
pub struct NewPrincipal {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    /// Set for federated sign-ups, where the provider already proved
    /// ownership of the email.
    pub email_verified: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

/// A federated-provider account bound to a principal.
/// (provider, subject) is unique across the system.
#[derive(Debug, Clone, FromRow)]
pub struct LinkedIdentity {
    pub provider: String,
    pub subject: String,
    pub principal_id: Uuid,
}

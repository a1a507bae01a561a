//! Signed session claims and the pure enrichment step.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::principal::PrincipalSummary;

/// Minimal identity facts embedded in the session token. The profile image
/// is deliberately absent: it is volatile and gets re-read from the store on
/// each request, so it can change without forcing a re-login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// A claims object plus the volatile facts layered on top. This is what
/// handlers see as "the current principal".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedSession {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub image_url: Option<String>,
}

/// Mints a signed session token for a just-authenticated principal.
pub fn mint(secret: &str, principal: &PrincipalSummary, ttl_hours: i64) -> Result<String> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: principal.id,
        email: principal.email.clone(),
        name: principal.name.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("failed to sign session token")
}

/// Verifies signature and expiry, returning the embedded claims.
pub fn decode(secret: &str, token: &str) -> Result<SessionClaims> {
    let data = jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("invalid session token")?;
    Ok(data.claims)
}

/// Pure enrichment: identity comes from the signed claims, only the image is
/// overwritten from the live store value. When the lookup failed upstream the
/// caller passes `None` and the session stays valid with a stale (absent)
/// image — a store outage never invalidates an otherwise-valid session.
pub fn enrich(claims: &SessionClaims, live_image: Option<String>) -> EnrichedSession {
    EnrichedSession {
        id: claims.sub,
        email: claims.email.clone(),
        name: claims.name.clone(),
        image_url: live_image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> PrincipalSummary {
        PrincipalSummary {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
        }
    }

    #[test]
    fn test_mint_and_decode_round_trip() {
        let principal = ana();
        let token = mint("secret", &principal, 1).unwrap();
        let claims = decode("secret", &token).unwrap();
        assert_eq!(claims.sub, principal.id);
        assert_eq!(claims.email, "ana@x.com");
        assert_eq!(claims.name, "Ana");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = mint("secret", &ana(), 1).unwrap();
        assert!(decode("other-secret", &token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Negative TTL puts exp in the past, beyond the default leeway.
        let token = mint("secret", &ana(), -2).unwrap();
        assert!(decode("secret", &token).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let token = mint("secret", &ana(), 1);
        let mut token = token.unwrap();
        token.push('A');
        assert!(decode("secret", &token).is_err());
    }

    #[test]
    fn test_enrich_overwrites_only_the_image() {
        let principal = ana();
        let token = mint("secret", &principal, 1).unwrap();
        let claims = decode("secret", &token).unwrap();

        let with_image = enrich(&claims, Some("https://cdn.example/ana.png".to_string()));
        assert_eq!(with_image.id, principal.id);
        assert_eq!(with_image.name, "Ana");
        assert_eq!(
            with_image.image_url.as_deref(),
            Some("https://cdn.example/ana.png")
        );

        // Store unreachable: identity facts survive untouched.
        let degraded = enrich(&claims, None);
        assert_eq!(degraded.id, principal.id);
        assert_eq!(degraded.email, "ana@x.com");
        assert!(degraded.image_url.is_none());
    }
}

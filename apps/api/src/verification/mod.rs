//! Token ledger for email-ownership proof.
//!
//! Tokens are unguessable (32 random bytes), single-use and time-boxed.
//! Consumption is a `take` on the store: the row is deleted atomically, so a
//! second use of the same string fails even when two requests race.

pub mod handlers;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use rand::RngCore;

use crate::mail::Mailer;
use crate::models::token::VerificationToken;
use crate::store::{IdentityStore, StoreResult};

pub const TOKEN_TTL_HOURS: i64 = 24;

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues a fresh token for `email`, replacing any earlier ones so only the
/// most recently mailed link works.
pub async fn issue(store: &dyn IdentityStore, email: &str) -> StoreResult<VerificationToken> {
    store.delete_tokens_for_email(email).await?;
    let token = VerificationToken {
        token: generate_token(),
        email: email.to_string(),
        expires_at: Utc::now() + Duration::hours(TOKEN_TTL_HOURS),
    };
    store.insert_verification_token(&token).await?;
    Ok(token)
}

/// Issues a token and mails the verification link. The send itself is
/// best-effort (see `Mailer`).
pub async fn issue_and_send(
    store: &dyn IdentityStore,
    mailer: &dyn Mailer,
    app_base_url: &str,
    email: &str,
) -> StoreResult<()> {
    let token = issue(store, email).await?;
    let verify_url = format!("{app_base_url}/verify-email?token={}", token.token);
    mailer.send_verification(email, &verify_url).await;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Token accepted; the owning principal's email is now verified.
    Verified(String),
    /// Unknown or already-used token string.
    Invalid,
    /// The token existed but was past its expiry. The row is gone either
    /// way; the user has to request a fresh link.
    Expired,
}

pub async fn consume(store: &dyn IdentityStore, token: &str) -> StoreResult<ConsumeOutcome> {
    let Some(row) = store.take_verification_token(token).await? else {
        return Ok(ConsumeOutcome::Invalid);
    };
    if row.is_expired(Utc::now()) {
        return Ok(ConsumeOutcome::Expired);
    }
    // The principal may have been swept between issuance and use.
    if store.mark_email_verified(&row.email, Utc::now()).await? {
        Ok(ConsumeOutcome::Verified(row.email))
    } else {
        Ok(ConsumeOutcome::Invalid)
    }
}

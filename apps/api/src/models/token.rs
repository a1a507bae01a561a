use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Single-use email-verification token. Deleted atomically on consumption,
/// never updated.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::policy::{email_shape_ok, normalize_email};
use crate::errors::AppError;
use crate::state::AppState;
use crate::verification::{self, ConsumeOutcome};

#[derive(Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// GET/POST /verify-email?token=
///
/// Always answers with a redirect to the login surface; the outcome travels
/// in the query string so the page can render success or a reason.
pub async fn handle_verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Redirect, AppError> {
    let base = &state.config.app_base_url;

    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Ok(Redirect::to(&format!("{base}/login?error=missing_token")));
    };

    match verification::consume(state.store.as_ref(), &token).await? {
        ConsumeOutcome::Verified(email) => {
            info!("Email verified for {email}");
            Ok(Redirect::to(&format!("{base}/login?verified=1")))
        }
        ConsumeOutcome::Invalid => Ok(Redirect::to(&format!("{base}/login?error=invalid_token"))),
        ConsumeOutcome::Expired => Ok(Redirect::to(&format!("{base}/login?error=expired_token"))),
    }
}

#[derive(Deserialize)]
pub struct ResendRequest {
    pub email: String,
}

/// POST /resend-verification
///
/// Answers the same way whether or not the account exists, to keep the
/// endpoint useless for enumeration. A mail only actually goes out for an
/// existing unverified local account.
pub async fn handle_resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendRequest>,
) -> Result<Json<Value>, AppError> {
    if !email_shape_ok(&req.email) {
        return Err(AppError::Validation(
            "email must be a valid email address".to_string(),
        ));
    }
    let email = normalize_email(&req.email);

    if let Some(principal) = state.store.principal_by_email(&email).await? {
        if principal.password_hash.is_some() && principal.email_verified.is_none() {
            verification::issue_and_send(
                state.store.as_ref(),
                state.mailer.as_ref(),
                &state.config.app_base_url,
                &email,
            )
            .await?;
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": "If the account exists and is unverified, a new link has been sent",
    })))
}

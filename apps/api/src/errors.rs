use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Field name → messages, for form binding on the client.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// The authentication variants are deliberately coarse: wrong password,
/// unknown email and federated-only accounts all collapse into `AuthFailed`
/// so responses cannot be used to enumerate accounts. Only the unverified
/// state is distinguishable, because the client needs it to offer a
/// resend-verification action.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation failed on {} field(s)", .0.len())]
    FieldValidation(FieldErrors),

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Store(sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => AppError::Conflict("already registered".to_string()),
            StoreError::Corrupt(msg) => AppError::Internal(anyhow::anyhow!(msg)),
            StoreError::Unavailable(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg.clone()),
            AppError::FieldValidation(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION",
                "One or more fields are invalid".to_string(),
            ),
            AppError::NotAuthorized => (
                StatusCode::UNAUTHORIZED,
                "NOT_AUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::AuthFailed => (
                StatusCode::UNAUTHORIZED,
                "AUTH_FAILED",
                "Invalid email or password".to_string(),
            ),
            AppError::EmailNotVerified => (
                StatusCode::FORBIDDEN,
                "EMAIL_NOT_VERIFIED",
                "Please verify your email address before signing in".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TRANSIENT_STORE_ERROR",
                    "A temporary storage error occurred, please retry".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = match &self {
            AppError::FieldValidation(fields) => Json(json!({
                "success": false,
                "error": { "code": code, "message": message },
                "fieldErrors": fields,
            })),
            _ => Json(json!({
                "success": false,
                "error": { "code": code, "message": message },
            })),
        };

        (status, body).into_response()
    }
}

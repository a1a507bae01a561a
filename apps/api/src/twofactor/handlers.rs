use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::session::guard::CurrentPrincipal;
use crate::state::AppState;
use crate::twofactor::manager;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupResponse {
    pub secret: String,
    pub otpauth_url: String,
}

/// GET/POST /api/v1/twofactor/setup
///
/// Hands out a fresh secret and enrollment URI. Calling this again before
/// confirming simply replaces the pending secret; nothing is stored yet.
pub async fn handle_setup(
    CurrentPrincipal(session): CurrentPrincipal,
) -> Result<Json<SetupResponse>, AppError> {
    let payload = manager::generate_secret(&session.email);
    Ok(Json(SetupResponse {
        secret: payload.secret,
        otpauth_url: payload.otpauth_url,
    }))
}

#[derive(Deserialize)]
pub struct EnableRequest {
    pub secret: String,
    pub code: String,
}

/// POST /api/v1/twofactor/enable
pub async fn handle_enable(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
    Json(req): Json<EnableRequest>,
) -> Result<Json<Value>, AppError> {
    let enabled = manager::enable(state.store.as_ref(), session.id, &req.secret, &req.code).await?;
    if enabled {
        Ok(Json(json!({ "success": true, "enabled": true })))
    } else {
        // Wrong code: state unchanged, the client may retry with the same
        // pending secret.
        Ok(Json(json!({
            "success": false,
            "enabled": false,
            "message": "The code did not match, please try again",
        })))
    }
}

/// POST /api/v1/twofactor/disable
pub async fn handle_disable(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
) -> Result<Json<Value>, AppError> {
    manager::disable(state.store.as_ref(), session.id).await?;
    Ok(Json(json!({ "success": true, "enabled": false })))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

/// POST /api/v1/twofactor/verify
pub async fn handle_verify(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Value>, AppError> {
    let valid = manager::verify_code(state.store.as_ref(), session.id, &req.code).await?;
    Ok(Json(json!({ "success": true, "valid": valid })))
}

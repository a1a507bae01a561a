use axum::{
    extract::{Path, Query, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::activity;
use crate::auth::federated::{self, Provider};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::policy;
use crate::auth::reconciler::{self, RegistrationForm};
use crate::errors::{AppError, FieldErrors};
use crate::models::activity::ActivityType;
use crate::session::{self, claims, guard::CurrentPrincipal};
use crate::state::AppState;
use crate::store::IdentityStore;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let summary = reconciler::register(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config.app_base_url,
        RegistrationForm {
            name: req.name,
            email: req.email,
            password: req.password,
            confirm_password: req.confirm_password,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Account created, please check your inbox for a verification link",
            "user": { "id": summary.id, "name": summary.name, "email": summary.email },
        })),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/auth/login
///
/// On success mints the signed session token, sets it as a cookie and
/// records a sign-in activity. Two-factor enrollment is not consulted here.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let summary =
        reconciler::authorize_local(state.store.as_ref(), &req.email, &req.password).await?;

    let token = claims::mint(
        &state.config.session_secret,
        &summary,
        state.config.session_ttl_hours,
    )?;
    let cookie = session::session_cookie(
        &token,
        state.config.session_ttl_hours,
        state.config.production,
    );

    activity::record(
        state.store.as_ref(),
        summary.id,
        ActivityType::Login,
        "Signed in",
        None,
        json!({ "method": "password" }),
    )
    .await;

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({
            "success": true,
            "token": token,
            "user": { "id": summary.id, "name": summary.name, "email": summary.email },
        })),
    ))
}

/// POST /api/v1/auth/logout
///
/// Sessions are stateless, so this clears the client cookie and records the
/// sign-out; the token itself stays valid until expiry.
pub async fn handle_logout(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
) -> impl IntoResponse {
    activity::record(
        state.store.as_ref(),
        session.id,
        ActivityType::Logout,
        "Signed out",
        None,
        json!({}),
    )
    .await;

    (
        AppendHeaders([(
            SET_COOKIE,
            session::clear_session_cookie(state.config.production),
        )]),
        Json(json!({ "success": true })),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

/// Re-proves the current password, then swaps in the new hash. All form
/// problems come back as field errors so the client can bind them.
async fn apply_password_change(
    store: &dyn IdentityStore,
    principal_id: Uuid,
    req: &ChangePasswordRequest,
) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    let new_issues = policy::password_problems(&req.new_password);
    if !new_issues.is_empty() {
        errors.insert("newPassword".to_string(), new_issues);
    }
    if req.new_password == req.current_password {
        errors
            .entry("newPassword".to_string())
            .or_default()
            .push("must differ from the current password".to_string());
    }
    if req.new_password != req.confirm_new_password {
        errors
            .entry("confirmNewPassword".to_string())
            .or_default()
            .push("does not match the new password".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::FieldValidation(errors));
    }

    let principal = store
        .principal_by_id(principal_id)
        .await?
        .ok_or(AppError::NotAuthorized)?;
    let Some(hash) = principal.password_hash.as_deref() else {
        return Err(AppError::Validation(
            "This account signs in through a federated provider and has no password".to_string(),
        ));
    };
    if !verify_password(&req.current_password, hash)? {
        let mut errors = FieldErrors::new();
        errors.insert(
            "currentPassword".to_string(),
            vec!["is incorrect".to_string()],
        );
        return Err(AppError::FieldValidation(errors));
    }

    let new_hash = hash_password(&req.new_password)?;
    store.update_password_hash(principal_id, &new_hash).await?;

    activity::record(
        store,
        principal_id,
        ActivityType::PasswordChanged,
        "Password changed",
        None,
        json!({}),
    )
    .await;
    Ok(())
}

/// POST /api/v1/auth/change-password
pub async fn handle_change_password(
    State(state): State<AppState>,
    CurrentPrincipal(session): CurrentPrincipal,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    apply_password_change(state.store.as_ref(), session.id, &req).await?;
    Ok(Json(json!({ "success": true })))
}

fn provider_client(state: &AppState, provider: Provider) -> Result<crate::config::OauthClient, AppError> {
    let client = match provider {
        Provider::Google => state.config.google.clone(),
        Provider::GitHub => state.config.github.clone(),
    };
    client.ok_or_else(|| {
        AppError::Validation(format!(
            "Sign-in via {} is not configured",
            provider.as_str()
        ))
    })
}

fn callback_uri(state: &AppState, provider: Provider) -> String {
    format!(
        "{}/api/v1/auth/federated/{}/callback",
        state.config.api_base_url,
        provider.as_str()
    )
}

fn login_error_redirect(state: &AppState, reason: &str) -> Redirect {
    Redirect::to(&format!("{}/login?error={reason}", state.config.app_base_url))
}

/// GET /api/v1/auth/federated/:provider
///
/// Starts the provider round-trip: signs a CSRF state and redirects the
/// user agent to the provider's consent screen.
pub async fn handle_federated_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Redirect, AppError> {
    let provider = Provider::from_path(&provider)
        .ok_or_else(|| AppError::Validation(format!("Unknown provider '{provider}'")))?;
    let client = provider_client(&state, provider)?;

    let csrf = federated::sign_state(&state.config.session_secret);
    let url = federated::authorize_url(provider, &client, &callback_uri(&state, provider), &csrf);
    Ok(Redirect::to(&url))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /api/v1/auth/federated/:provider/callback
///
/// Redeems the code, reconciles the provider profile into a principal and
/// mints a session. All failure paths land back on the login page with a
/// reason code; none of them leak provider internals.
pub async fn handle_federated_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let provider = Provider::from_path(&provider)
        .ok_or_else(|| AppError::Validation(format!("Unknown provider '{provider}'")))?;
    let client = provider_client(&state, provider)?;

    if let Some(error) = query.error {
        warn!(provider = provider.as_str(), %error, "Federated sign-in denied");
        return Ok(login_error_redirect(&state, "federated_denied").into_response());
    }
    let csrf_ok = query
        .state
        .as_deref()
        .map(|s| federated::state_valid(&state.config.session_secret, s))
        .unwrap_or(false);
    if !csrf_ok {
        return Ok(login_error_redirect(&state, "state_mismatch").into_response());
    }
    let Some(code) = query.code else {
        return Ok(login_error_redirect(&state, "federated_failed").into_response());
    };

    let profile = match federated::fetch_profile(
        &state.http,
        provider,
        &client,
        &callback_uri(&state, provider),
        &code,
    )
    .await
    {
        Ok(profile) => profile,
        Err(e) => {
            warn!(provider = provider.as_str(), "Federated profile fetch failed: {e:#}");
            return Ok(login_error_redirect(&state, "federated_failed").into_response());
        }
    };

    let summary = reconciler::reconcile_federated(state.store.as_ref(), profile).await?;

    let token = claims::mint(
        &state.config.session_secret,
        &summary,
        state.config.session_ttl_hours,
    )?;
    let cookie = session::session_cookie(
        &token,
        state.config.session_ttl_hours,
        state.config.production,
    );

    activity::record(
        state.store.as_ref(),
        summary.id,
        ActivityType::Login,
        "Signed in",
        None,
        json!({ "method": provider.as_str() }),
    )
    .await;

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Redirect::to(&format!("{}/dashboard", state.config.app_base_url)),
    )
        .into_response())
}

//! Per-request session reading and the routing predicate.
//!
//! The signed claims are the source of identity; the store is only consulted
//! to refresh the volatile image, and only when enrichment is enabled. This
//! code sits on the hot path of every request and must not panic.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::warn;

use crate::errors::AppError;
use crate::session::claims::{self, EnrichedSession, SessionClaims};
use crate::session::{cookie_value, SESSION_COOKIE};
use crate::state::AppState;

/// Paths a signed-in principal has no business visiting; they get redirected
/// to the dashboard instead.
const SIGN_IN_SURFACE: &[&str] = &["/api/v1/auth/login", "/api/v1/auth/register"];

/// Paths reachable without a session. Everything else is denied outright —
/// a 401, not a redirect.
fn is_exempt(path: &str) -> bool {
    path == "/health"
        || path == "/verify-email"
        || path == "/resend-verification"
        || SIGN_IN_SURFACE.contains(&path)
        || path.starts_with("/api/v1/auth/federated/")
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Session token from the cookie, falling back to a Bearer header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|c| cookie_value(c, SESSION_COOKIE));
    from_cookie
        .or_else(|| bearer_token(headers))
        .map(|s| s.to_string())
}

fn valid_claims(headers: &HeaderMap, secret: &str) -> Option<SessionClaims> {
    let token = session_token(headers)?;
    claims::decode(secret, &token).ok()
}

/// The authenticated principal for this request — the `getCurrentPrincipal`
/// surface consumed by handlers. Rejects with `NOT_AUTHORIZED` when no valid
/// session travels with the request.
pub struct CurrentPrincipal(pub EnrichedSession);

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let claims =
            valid_claims(&parts.headers, &state.config.session_secret).ok_or(AppError::NotAuthorized)?;

        // Enrichment is best-effort: a transient store outage must never
        // invalidate an otherwise-valid session.
        let live_image = if state.config.with_storage_enrichment {
            match state.store.image_url(claims.sub).await {
                Ok(url) => url,
                Err(e) => {
                    warn!("Session enrichment lookup failed, serving stale claims: {e}");
                    None
                }
            }
        } else {
            None
        };

        Ok(CurrentPrincipal(claims::enrich(&claims, live_image)))
    }
}

/// Routing predicate applied to every request behind the perimeter gate:
/// unauthenticated traffic to non-exempt paths is denied, and authenticated
/// traffic to the sign-in surface is sent to the dashboard.
pub async fn session_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let authed = valid_claims(req.headers(), &state.config.session_secret).is_some();

    if authed && SIGN_IN_SURFACE.contains(&path.as_str()) {
        let target = format!("{}/dashboard", state.config.app_base_url);
        return Redirect::to(&target).into_response();
    }
    if !authed && !is_exempt(&path) {
        return AppError::NotAuthorized.into_response();
    }
    next.run(req).await
}

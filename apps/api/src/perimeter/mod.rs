//! Perimeter gate: a coarse, principal-independent lock ahead of routing.
//!
//! Every request must carry either a previously minted signed cookie or a
//! Basic credential matching the environment-configured pair. This answers
//! "may this traffic reach the app at all", orthogonal to user sessions.
//! The gate sits in front of all traffic, so nothing in here may panic:
//! any malformed input simply fails the check and draws the challenge.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::session::cookie_value;
use crate::state::AppState;

pub const PERIMETER_COOKIE: &str = "perimeter-auth";
const COOKIE_TTL_DAYS: i64 = 7;
const VALUE_PREFIX: &str = "authenticated";

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

fn eq_ct(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Mints a cookie value of the form `authenticated:<exp>:<mac>`. Each call
/// produces an independently valid cookie; concurrent first contacts do not
/// share any state.
pub fn mint_cookie_value(secret: &str, now: DateTime<Utc>) -> String {
    let exp = (now + Duration::days(COOKIE_TTL_DAYS)).timestamp();
    let payload = format!("{VALUE_PREFIX}:{exp}");
    let tag = mac(secret, &payload);
    format!("{payload}:{tag}")
}

/// Checks a presented cookie value: shape, expiry, then MAC.
pub fn cookie_valid(secret: &str, value: &str, now: DateTime<Utc>) -> bool {
    let mut parts = value.splitn(3, ':');
    let (Some(prefix), Some(exp), Some(tag)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if prefix != VALUE_PREFIX {
        return false;
    }
    let Ok(exp) = exp.parse::<i64>() else {
        return false;
    };
    if exp <= now.timestamp() {
        return false;
    }
    eq_ct(&mac(secret, &format!("{VALUE_PREFIX}:{exp}")), tag)
}

/// Parses `Authorization: Basic <base64(user:pass)>`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn credentials_match(headers: &HeaderMap, expected_user: &str, expected_pass: &str) -> bool {
    match basic_credentials(headers) {
        Some((user, pass)) => eq_ct(&user, expected_user) & eq_ct(&pass, expected_pass),
        None => false,
    }
}

fn challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"Restricted\""),
        )],
        "Authentication required",
    )
        .into_response()
}

fn perimeter_cookie_header(value: &str, secure: bool) -> Option<HeaderValue> {
    let max_age = COOKIE_TTL_DAYS * 24 * 3600;
    let mut cookie =
        format!("{PERIMETER_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

/// The gate itself. Runs ahead of the session layer and of routing; only the
/// health check is exempt.
pub async fn perimeter_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let secret = &state.config.session_secret;
    let now = Utc::now();

    let has_cookie = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|c| cookie_value(c, PERIMETER_COOKIE))
        .map(|v| cookie_valid(secret, v, now))
        .unwrap_or(false);
    if has_cookie {
        return next.run(req).await;
    }

    if credentials_match(
        req.headers(),
        &state.config.perimeter_user,
        &state.config.perimeter_password,
    ) {
        // First valid header proof: mint a cookie so later requests skip the
        // challenge for a week.
        let minted = mint_cookie_value(secret, now);
        let mut response = next.run(req).await;
        if let Some(cookie) = perimeter_cookie_header(&minted, state.config.production) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        return response;
    }

    challenge()
}

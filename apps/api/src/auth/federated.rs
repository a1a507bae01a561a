//! Federated sign-in plumbing: Google and GitHub OAuth code exchange.
//!
//! Each provider only has to assert a verified email plus basic profile
//! facts; everything after that goes through the same reconciliation path
//! as every other sign-in. The CSRF state parameter is self-authenticating
//! (`<exp>:<mac>` under the session secret), so no server-side state table
//! is needed.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::auth::reconciler::FederatedProfile;
use crate::config::OauthClient;

const STATE_TTL_MINUTES: i64 = 10;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    GitHub,
}

impl Provider {
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "google" => Some(Provider::Google),
            "github" => Some(Provider::GitHub),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::GitHub => "github",
        }
    }
}

fn state_mac(secret: &str, exp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("oauth-state:{exp}").as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

pub(crate) fn sign_state_at(secret: &str, now: DateTime<Utc>) -> String {
    let exp = (now + Duration::minutes(STATE_TTL_MINUTES)).timestamp();
    format!("{exp}:{}", state_mac(secret, exp))
}

/// Mints the CSRF state carried through the provider round-trip.
pub fn sign_state(secret: &str) -> String {
    sign_state_at(secret, Utc::now())
}

/// Validates a returned state parameter: shape, expiry, then MAC.
pub fn state_valid(secret: &str, state: &str) -> bool {
    let Some((exp, tag)) = state.split_once(':') else {
        return false;
    };
    let Ok(exp) = exp.parse::<i64>() else {
        return false;
    };
    if exp <= Utc::now().timestamp() {
        return false;
    }
    let expected = state_mac(secret, exp);
    expected.len() == tag.len() && expected.as_bytes().ct_eq(tag.as_bytes()).into()
}

/// Minimal percent-encoding for query string values.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Builds the provider authorize URL the user agent is redirected to.
pub fn authorize_url(
    provider: Provider,
    client: &OauthClient,
    redirect_uri: &str,
    state: &str,
) -> String {
    match provider {
        Provider::Google => format!(
            "https://accounts.google.com/o/oauth2/v2/auth\
             ?client_id={}&redirect_uri={}&response_type=code\
             &scope=openid%20email%20profile&state={}",
            urlencode(&client.client_id),
            urlencode(redirect_uri),
            urlencode(state),
        ),
        Provider::GitHub => format!(
            "https://github.com/login/oauth/authorize\
             ?client_id={}&redirect_uri={}&scope=read%3Auser%20user%3Aemail&state={}",
            urlencode(&client.client_id),
            urlencode(redirect_uri),
            urlencode(state),
        ),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
    picture: Option<String>,
}

/// Maps the Google userinfo payload to a profile. The whole federated path
/// rests on the provider having proved email ownership, so an account whose
/// email Google itself does not vouch for is refused outright.
fn google_profile(info: GoogleUserInfo) -> Result<FederatedProfile> {
    if !info.verified_email {
        return Err(anyhow!("google account email is not verified"));
    }
    let name = info.name.unwrap_or_else(|| info.email.clone());
    Ok(FederatedProfile {
        provider: Provider::Google.as_str().to_string(),
        subject: info.id,
        email: info.email,
        name,
        image_url: info.picture,
    })
}

#[derive(Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Redeems the authorization code and fetches the provider profile.
pub async fn fetch_profile(
    http: &reqwest::Client,
    provider: Provider,
    client: &OauthClient,
    redirect_uri: &str,
    code: &str,
) -> Result<FederatedProfile> {
    match provider {
        Provider::Google => fetch_google(http, client, redirect_uri, code).await,
        Provider::GitHub => fetch_github(http, client, redirect_uri, code).await,
    }
}

async fn fetch_google(
    http: &reqwest::Client,
    client: &OauthClient,
    redirect_uri: &str,
    code: &str,
) -> Result<FederatedProfile> {
    let token: TokenResponse = http
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .context("google token exchange failed")?
        .error_for_status()
        .context("google token exchange rejected")?
        .json()
        .await
        .context("google token response malformed")?;

    let info: GoogleUserInfo = http
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(&token.access_token)
        .send()
        .await
        .context("google userinfo fetch failed")?
        .error_for_status()
        .context("google userinfo rejected")?
        .json()
        .await
        .context("google userinfo malformed")?;

    google_profile(info)
}

async fn fetch_github(
    http: &reqwest::Client,
    client: &OauthClient,
    redirect_uri: &str,
    code: &str,
) -> Result<FederatedProfile> {
    let token: TokenResponse = http
        .post("https://github.com/login/oauth/access_token")
        .header("Accept", "application/json")
        .form(&[
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .context("github token exchange failed")?
        .error_for_status()
        .context("github token exchange rejected")?
        .json()
        .await
        .context("github token response malformed")?;

    // GitHub insists on a User-Agent for API calls.
    let user: GitHubUser = http
        .get("https://api.github.com/user")
        .bearer_auth(&token.access_token)
        .header("User-Agent", "cvbuilder-api")
        .send()
        .await
        .context("github user fetch failed")?
        .error_for_status()
        .context("github user rejected")?
        .json()
        .await
        .context("github user malformed")?;

    // The profile email may be private; fall back to the verified primary
    // from the emails endpoint.
    let email = match user.email {
        Some(email) => email,
        None => {
            let emails: Vec<GitHubEmail> = http
                .get("https://api.github.com/user/emails")
                .bearer_auth(&token.access_token)
                .header("User-Agent", "cvbuilder-api")
                .send()
                .await
                .context("github emails fetch failed")?
                .error_for_status()
                .context("github emails rejected")?
                .json()
                .await
                .context("github emails malformed")?;
            emails
                .into_iter()
                .find(|e| e.primary && e.verified)
                .map(|e| e.email)
                .ok_or_else(|| anyhow!("github account has no verified primary email"))?
        }
    };

    let name = user.name.unwrap_or(user.login);
    Ok(FederatedProfile {
        provider: Provider::GitHub.as_str().to_string(),
        subject: user.id.to_string(),
        email,
        name,
        image_url: user.avatar_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "state-test-secret";

    #[test]
    fn test_state_round_trip() {
        let state = sign_state(SECRET);
        assert!(state_valid(SECRET, &state));
        assert!(!state_valid("other-secret", &state));
    }

    #[test]
    fn test_expired_state_rejected() {
        let stale = sign_state_at(SECRET, Utc::now() - Duration::minutes(STATE_TTL_MINUTES + 1));
        assert!(!state_valid(SECRET, &stale));
    }

    #[test]
    fn test_tampered_state_rejected() {
        let state = sign_state(SECRET);
        let (exp, tag) = state.split_once(':').unwrap();
        let stretched_exp: i64 = exp.parse::<i64>().unwrap() + 3600;
        assert!(!state_valid(SECRET, &format!("{stretched_exp}:{tag}")));
        assert!(!state_valid(SECRET, "garbage"));
        assert!(!state_valid(SECRET, ""));
    }

    #[test]
    fn test_unverified_google_email_is_refused() {
        // Anyone can register a Google account under someone else's address
        // and leave it unverified; such an account must never reconcile.
        let info = GoogleUserInfo {
            id: "g-1".to_string(),
            email: "victim@x.com".to_string(),
            verified_email: false,
            name: Some("Mallory".to_string()),
            picture: None,
        };
        assert!(google_profile(info).is_err());
    }

    #[test]
    fn test_verified_google_email_maps_to_profile() {
        let info = GoogleUserInfo {
            id: "g-1".to_string(),
            email: "ana@x.com".to_string(),
            verified_email: true,
            name: None,
            picture: Some("https://lh3.example/ana.png".to_string()),
        };
        let profile = google_profile(info).unwrap();
        assert_eq!(profile.provider, "google");
        assert_eq!(profile.subject, "g-1");
        assert_eq!(profile.email, "ana@x.com");
        // Missing display name falls back to the email.
        assert_eq!(profile.name, "ana@x.com");
        assert_eq!(profile.image_url.as_deref(), Some("https://lh3.example/ana.png"));
    }

    #[test]
    fn test_missing_verified_email_field_defaults_closed() {
        // An absent field deserializes to false and is treated as unverified.
        let info: GoogleUserInfo =
            serde_json::from_str(r#"{"id":"g-2","email":"ana@x.com"}"#).unwrap();
        assert!(google_profile(info).is_err());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(Provider::from_path("google"), Some(Provider::Google));
        assert_eq!(Provider::from_path("github"), Some(Provider::GitHub));
        assert_eq!(Provider::from_path("gitlab"), None);
        assert_eq!(Provider::Google.as_str(), "google");
    }

    #[test]
    fn test_authorize_url_encodes_parameters() {
        let client = OauthClient {
            client_id: "my-client".to_string(),
            client_secret: "unused-here".to_string(),
        };
        let url = authorize_url(
            Provider::Google,
            &client,
            "http://localhost:8080/api/v1/auth/federated/google/callback",
            "123:abc",
        );
        assert!(url.starts_with("https://accounts.google.com/"));
        assert!(url.contains("client_id=my-client"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fapi%2Fv1%2Fauth%2Ffederated%2Fgoogle%2Fcallback"));
        assert!(url.contains("state=123%3Aabc"));
        assert!(!url.contains("unused-here"));
    }
}

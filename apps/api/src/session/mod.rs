//! Stateless session credential: a signed, time-boxed claims object carried
//! by the client. There is no server-side session table and no revocation
//! list; sign-out clears the client cookie and nothing else.

pub mod claims;
pub mod guard;

pub const SESSION_COOKIE: &str = "session-token";

/// Builds the Set-Cookie value for a freshly minted session token.
pub fn session_cookie(token: &str, ttl_hours: i64, secure: bool) -> String {
    let max_age = ttl_hours * 3600;
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expires the session cookie immediately (logout).
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extracts one cookie value from a Cookie header line.
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

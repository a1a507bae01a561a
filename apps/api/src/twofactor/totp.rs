//! RFC 6238 time-based one-time codes over HMAC-SHA1.
//!
//! 30-second step, 6 digits, one step of clock drift tolerated in each
//! direction. Secrets are 20 random bytes, base32-encoded with the RFC 4648
//! alphabet that authenticator apps expect.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const DIGITS: usize = 6;
pub const STEP_SECONDS: u64 = 30;
const DRIFT_STEPS: i64 = 1;
const SECRET_BYTES: usize = 20;

const B32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

/// A fresh random shared secret, base32-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base32::encode(B32, &bytes)
}

/// Enrollment URI consumed by authenticator apps via QR code.
pub fn otpauth_uri(secret: &str, account: &str, issuer: &str) -> String {
    // '@' is the only character we expect in account labels that needs
    // escaping for the URI label segment.
    let label = account.replace('@', "%40");
    format!(
        "otpauth://totp/{issuer}:{label}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECONDS}"
    )
}

/// RFC 4226 HOTP with dynamic truncation.
fn hotp(key: &[u8], counter: u64) -> u32 {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = ((digest[offset] & 0x7f) as u32) << 24
        | (digest[offset + 1] as u32) << 16
        | (digest[offset + 2] as u32) << 8
        | digest[offset + 3] as u32;
    bin % 10u32.pow(DIGITS as u32)
}

/// The code for a given Unix timestamp, or `None` when the secret is not
/// valid base32.
pub fn code_at(secret: &str, unix_time: i64) -> Option<String> {
    let key = base32::decode(B32, secret)?;
    let counter = (unix_time.max(0) as u64) / STEP_SECONDS;
    Some(format!("{:0width$}", hotp(&key, counter), width = DIGITS))
}

/// Checks a user-supplied code against the secret, tolerating one step of
/// drift either way.
pub fn verify(secret: &str, code: &str, unix_time: i64) -> bool {
    let code = code.trim();
    if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    for drift in -DRIFT_STEPS..=DRIFT_STEPS {
        let t = unix_time + drift * STEP_SECONDS as i64;
        if let Some(expected) = code_at(secret, t) {
            if expected == code {
                return true;
            }
        }
    }
    false
}

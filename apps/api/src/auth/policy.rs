//! Input shape validation for the auth surface.
//!
//! Runs before any store access: malformed input is rejected with zero
//! round-trips. Field problems are collected into field → messages maps for
//! form binding.

use crate::errors::FieldErrors;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 50;

/// Lowercases and trims an email address. All lookups and inserts use the
/// normalized form so `Ana@x.com` and `ana@x.com` are one account.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Cheap structural check; the real ownership proof is the verification mail.
pub fn email_shape_ok(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.len() > 254 || email.contains(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Acceptance policy: 8–50 chars, at least one lowercase, one uppercase and
/// one digit. Returns the list of violated rules.
pub fn password_problems(password: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        problems.push(format!("must be at least {PASSWORD_MIN_LEN} characters"));
    }
    if len > PASSWORD_MAX_LEN {
        problems.push(format!("must be at most {PASSWORD_MAX_LEN} characters"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("must contain a digit".to_string());
    }
    problems
}

/// Validates a registration form. Empty map means the form is acceptable.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if name.trim().is_empty() {
        errors
            .entry("name".to_string())
            .or_default()
            .push("must not be empty".to_string());
    }
    if !email_shape_ok(email) {
        errors
            .entry("email".to_string())
            .or_default()
            .push("must be a valid email address".to_string());
    }
    let password_issues = password_problems(password);
    if !password_issues.is_empty() {
        errors.insert("password".to_string(), password_issues);
    }
    if password != confirm_password {
        errors
            .entry("confirmPassword".to_string())
            .or_default()
            .push("does not match the password".to_string());
    }
    errors
}

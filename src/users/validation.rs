use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

pub const EMAIL_MAX: usize = 255;
pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Returns the normalized email or a validation error.
pub fn validate_email(email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if email.is_empty() || !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    if email.chars().count() > EMAIL_MAX {
        return Err(AppError::validation(format!(
            "Email must be at most {EMAIL_MAX} characters"
        )));
    }
    Ok(email)
}

/// Returns the trimmed username or a validation error.
pub fn validate_username(username: &str) -> AppResult<String> {
    let username = username.trim();
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AppError::validation(format!(
            "Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err(AppError::validation("Password too short"));
    }
    if len > PASSWORD_MAX {
        return Err(AppError::validation("Password too long"));
    }
    Ok(())
}

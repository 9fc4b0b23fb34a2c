// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for login and registration.

use acadify_common::Role;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_EMAIL_LENGTH: usize = 255;
const MAX_NAME_LENGTH: usize = 255;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z '-]*$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an email address, returning it trimmed and lower-cased
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail("Email is required".to_string()));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail("Email is too long".to_string()));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email format".to_string(),
        ));
    }
    Ok(email.to_lowercase())
}

/// Validate a password chosen at registration
pub fn validate_password(password: &str) -> ValidationResult<&str> {
    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password is required".to_string(),
        ));
    }
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(password)
}

/// Parse a role name
pub fn validate_role(role: &str) -> ValidationResult<Role> {
    if role.trim().is_empty() {
        return Err(ValidationError::InvalidRole("Role is required".to_string()));
    }
    role.parse::<Role>()
        .map_err(|_| ValidationError::InvalidRole("Must be STUDENT, TEACHER, or ADMIN".to_string()))
}

/// Validate a display name, returning it trimmed
pub fn validate_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidName("Name is required".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName("Name is too long".to_string()));
    }
    if !NAME_REGEX.is_match(name) {
        return Err(ValidationError::InvalidName(
            "Name contains invalid characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

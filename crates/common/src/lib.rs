// ================
// common/src/lib.rs
// ================
//! Common types shared between the Acadify auth core and the transport layer
//! that decodes requests and encodes responses around it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Account roles known to the records backend
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    /// Every role, in declaration order
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Admin];

    /// Canonical upper-case form, as stored in the `users.role` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names none of the known roles
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role `{0}`, expected STUDENT, TEACHER or ADMIN")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// The authenticated identity attached to an in-flight request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }
}

/// Registration request body, as decoded by the transport layer.
///
/// Fields are raw user input; the auth core validates and normalizes them.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub role: String,
    pub name: String,
}

/// Successful login
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user_id: i64,
    pub role: Role,
    pub token: String,
}

/// Successful registration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub user_id: i64,
    pub role: Role,
}

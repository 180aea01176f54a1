//! Email/password pair submitted by a client.

use serde::Deserialize;

use crate::error::{DomainError, DomainResult};

/// Credentials as decoded from a request body.
///
/// Missing JSON fields decode as empty strings so that absence and emptiness
/// are rejected by the same check.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reject empty fields. Email is checked first.
    pub fn validate(&self) -> DomainResult<()> {
        validate_pair(&self.email, &self.password)
    }
}

/// Shared non-emptiness check used by every store implementation.
pub fn validate_pair(email: &str, password: &str) -> DomainResult<()> {
    if email.is_empty() {
        return Err(DomainError::validation("email is required"));
    }
    if password.is_empty() {
        return Err(DomainError::validation("password is required"));
    }
    Ok(())
}

// Never print the password.
impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

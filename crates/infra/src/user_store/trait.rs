use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_auth::{CredentialHasher, HashError};
use warden_core::{DomainError, UserId};

/// A persisted user record.
///
/// Holds only the salted hash; the raw password is never stored. The `id` is
/// assigned once at registration and never changes. Field names follow the
/// bulk dataset format (camelCase).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub id: UserId,
    pub email: String,
    pub salted_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn new(email: impl Into<String>, salted_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: email.into(),
            salted_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

impl core::fmt::Debug for StoredUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoredUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("salted_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Credential store operation error.
///
/// Messages never carry passwords or hashes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Missing or malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The email is already registered.
    #[error("user already exists")]
    Conflict,

    /// No record for the email.
    #[error("user not found")]
    NotFound,

    /// The password did not match the stored hash.
    #[error("invalid email/password combination")]
    AuthFailed,

    /// Hashing or verification could not run.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// Backend I/O failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The store could not be constructed (bad dataset, unreachable backend).
    #[error("store initialization failed: {0}")]
    Init(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StoreError::Validation(msg),
        }
    }
}

impl From<HashError> for StoreError {
    fn from(err: HashError) -> Self {
        StoreError::Hashing(err.to_string())
    }
}

/// Credential store: registers users and authenticates email/password pairs.
///
/// ## Contract
///
/// `register_user()`:
/// - rejects an empty email or password with `Validation`
/// - rejects an already-registered email with `Conflict`, whatever the password
/// - otherwise stores a fresh id plus a salted hash and returns the id
///
/// `authenticate()`:
/// - rejects an empty email or password with `Validation`
/// - `NotFound` for an unknown email, `AuthFailed` for a wrong password
/// - otherwise returns the stored id
///
/// Both failure cases of `authenticate()` cost one password hash, so response
/// timing does not reveal which emails are registered.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn register_user(&self, email: &str, password: &str) -> Result<UserId, StoreError>;

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserId, StoreError>;
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn register_user(&self, email: &str, password: &str) -> Result<UserId, StoreError> {
        (**self).register_user(email, password).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<UserId, StoreError> {
        (**self).authenticate(email, password).await
    }
}

// Argon2 is CPU-bound; keep it off the async workers.

pub(crate) async fn hash_password(hasher: &CredentialHasher, password: &str) -> Result<String, StoreError> {
    let hasher = hasher.clone();
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| StoreError::Hashing(format!("hashing task failed: {e}")))?
        .map_err(StoreError::from)
}

pub(crate) async fn verify_password(
    hasher: &CredentialHasher,
    salted_hash: String,
    password: &str,
) -> Result<bool, StoreError> {
    let hasher = hasher.clone();
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hasher.verify(&salted_hash, &password))
        .await
        .map_err(|e| StoreError::Hashing(format!("verification task failed: {e}")))?
        .map_err(StoreError::from)
}

/// Spend the same work as a verification when the email is unknown.
pub(crate) async fn equalize_timing(hasher: &CredentialHasher, password: &str) {
    let _ = hash_password(hasher, password).await;
}

//! Bulk dataset of pre-existing users, loaded into a store at construction.
//!
//! The format is a JSON array of [`StoredUser`] records:
//!
//! ```json
//! [{ "id": "<uuid>", "email": "a@b.com", "saltedHash": "$argon2id$...",
//!    "createdAt": "2017-01-01T00:00:00Z", "updatedAt": "2018-01-01T00:00:00Z" }]
//! ```
//!
//! Both backends consume the parsed records identically. Uniqueness of emails
//! is left to the backend so that a duplicate fails the whole import.

use std::path::Path;

use warden_auth::CredentialHasher;

use super::r#trait::{StoreError, StoredUser};

pub fn parse_dataset(json: &str) -> Result<Vec<StoredUser>, StoreError> {
    let users: Vec<StoredUser> =
        serde_json::from_str(json).map_err(|e| StoreError::Init(format!("unparsable dataset: {e}")))?;

    for (idx, user) in users.iter().enumerate() {
        if user.email.is_empty() {
            return Err(StoreError::Init(format!("dataset record {idx} has an empty email")));
        }
        if !CredentialHasher::is_well_formed(&user.salted_hash) {
            return Err(StoreError::Init(format!(
                "dataset record {idx} ({}) has a malformed salted hash",
                user.email
            )));
        }
    }

    Ok(users)
}

pub fn load_dataset(path: &Path) -> Result<Vec<StoredUser>, StoreError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Init(format!("unable to read dataset {}: {e}", path.display())))?;
    let users = parse_dataset(&json)?;
    tracing::info!(path = %path.display(), records = users.len(), "dataset loaded");
    Ok(users)
}

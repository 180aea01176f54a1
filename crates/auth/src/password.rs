//! Salted one-way password hashing (Argon2id, PHC string format).

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Version};
use thiserror::Error;

/// Argon2 cost parameters accepted by [`CredentialHasher::with_params`].
pub use argon2::Params as HashParams;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("unable to gather salt entropy: {0}")]
    Entropy(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored hash is not a valid PHC string")]
    MalformedHash,
}

impl From<password_hash::Error> for HashError {
    fn from(err: password_hash::Error) -> Self {
        HashError::Hash(err.to_string())
    }
}

/// Hashes and verifies passwords.
///
/// Every call to [`CredentialHasher::hash`] draws a fresh 16-byte salt, so two
/// users with the same password get different hashes. Verification reads the
/// algorithm parameters from the stored PHC string, so hashes produced with
/// other parameters (e.g. an imported dataset) still verify.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHasher {
    const SALT_LENGTH: usize = 16;

    /// Argon2id with the crate's recommended default parameters.
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Argon2id with caller-specified cost parameters (tests, constrained hosts).
    pub fn with_params(params: HashParams) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        let mut salt_bytes = [0u8; Self::SALT_LENGTH];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| HashError::Entropy(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let phc = self.argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(phc.to_string())
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    pub fn verify(&self, stored_hash: &str, password: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(stored_hash).map_err(|_| HashError::MalformedHash)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `stored_hash` is an Argon2 PHC string this hasher can verify:
    /// a known variant, usable cost parameters, a salt and an output.
    pub fn is_well_formed(stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        matches!(parsed.algorithm.as_str(), "argon2id" | "argon2i" | "argon2d")
            && parsed.salt.is_some()
            && parsed.hash.is_some()
            && HashParams::try_from(&parsed).is_ok()
    }
}

//! `warden-auth` — password hashing and session-token issuance.
//!
//! This crate is decoupled from HTTP and storage.

pub mod claims;
pub mod issuer;
pub mod password;

pub use claims::{DEFAULT_SESSION_TTL_SECS, RegisteredClaims, SessionClaims, TokenValidationError, validate_claims};
pub use issuer::{JwtTokenIssuer, SigningConfig, TokenError, TokenIssuer};
pub use password::{CredentialHasher, HashError, HashParams};

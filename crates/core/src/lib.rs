//! `warden-core` — identity primitives shared by the store, issuer and API.
//!
//! This crate contains no infrastructure concerns.

pub mod credentials;
pub mod error;
pub mod id;

pub use credentials::{Credentials, validate_pair};
pub use error::{DomainError, DomainResult};
pub use id::UserId;

//! Request/response bodies.
//!
//! Requests decode straight into [`warden_core::Credentials`].

use serde::{Deserialize, Serialize};

/// Success body for both `/user` and `/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

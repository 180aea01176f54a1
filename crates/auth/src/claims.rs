use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::UserId;

/// Lifetime of a freshly minted session token.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Claim set handed to the token issuer.
///
/// Built fresh for every request and never persisted. All timestamps are
/// epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject (user id).
    pub sub: UserId,

    /// Subject's email address.
    pub email: String,

    /// Issued-at.
    pub iat: i64,

    /// Not valid before.
    pub nbf: i64,

    /// Expires at.
    pub exp: i64,
}

impl SessionClaims {
    /// Claims valid from `now` for [`DEFAULT_SESSION_TTL_SECS`].
    pub fn new(sub: UserId, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            sub,
            email: email.into(),
            iat,
            nbf: iat,
            exp: iat + DEFAULT_SESSION_TTL_SECS,
        }
    }

    /// The standard payload embedded in the signed token.
    pub fn registered(&self) -> RegisteredClaims {
        RegisteredClaims {
            sub: self.sub.to_string(),
            nbf: self.nbf,
            exp: self.exp,
            iat: self.iat,
        }
    }
}

/// Wire form of the token payload (`sub`, `nbf`, `exp`, `iat`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    pub sub: String,
    pub nbf: i64,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (nbf is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate a token's time window.
///
/// A token is valid for every `now` in `[nbf, exp]`. Signature checks are the
/// issuer's job.
pub fn validate_claims(claims: &RegisteredClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.nbf {
        return Err(TokenValidationError::NotYetValid);
    }
    if now > claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_at(now: DateTime<Utc>) -> RegisteredClaims {
        SessionClaims::new(UserId::new(), "a@b.com", now).registered()
    }

    #[test]
    fn new_claims_last_one_hour() {
        let now = Utc::now();
        let claims = SessionClaims::new(UserId::new(), "a@b.com", now);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn valid_inside_window() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert_eq!(validate_claims(&claims, now), Ok(()));
        assert_eq!(validate_claims(&claims, now + Duration::seconds(3600)), Ok(()));
    }

    #[test]
    fn expired_past_window() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert_eq!(
            validate_claims(&claims, now + Duration::seconds(3601)),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn not_yet_valid_before_nbf() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert_eq!(
            validate_claims(&claims, now - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn rejects_inverted_window() {
        let now = Utc::now();
        let mut claims = claims_at(now);
        claims.exp = claims.iat;
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn registered_payload_uses_user_id_as_subject() {
        let id = UserId::new();
        let claims = SessionClaims::new(id, "a@b.com", Utc::now());
        assert_eq!(claims.registered().sub, id.to_string());
    }
}

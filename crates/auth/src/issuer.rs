//! Session-token issuance.
//!
//! One signing strategy is selected when the issuer is built and never changes
//! afterwards: HS512 with a shared secret, or RS512 with an RSA key pair.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{RegisteredClaims, SessionClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Construction-time misconfiguration; the service must not start.
    #[error("invalid token signing configuration: {0}")]
    Config(String),

    /// Unexpected failure while minting.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Signature or structure check failed while verifying.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Mints signed session tokens.
///
/// Implementations hold no per-call mutable state and are shared across
/// concurrent requests.
pub trait TokenIssuer: Send + Sync {
    fn mint(&self, claims: &SessionClaims) -> Result<String, TokenError>;
}

impl<T> TokenIssuer for std::sync::Arc<T>
where
    T: TokenIssuer + ?Sized,
{
    fn mint(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        (**self).mint(claims)
    }
}

/// Key material for exactly one signing strategy.
#[derive(Clone, PartialEq, Eq)]
pub enum SigningConfig {
    SharedSecret(Vec<u8>),
    RsaKeyPair { private_pem: Vec<u8>, public_pem: Vec<u8> },
}

impl SigningConfig {
    /// Pick the strategy from optional inputs.
    ///
    /// A non-empty secret wins. Otherwise both RSA halves are required; a lone
    /// half, or nothing at all, is a configuration error.
    pub fn select(
        secret: Option<&[u8]>,
        private_pem: Option<&[u8]>,
        public_pem: Option<&[u8]>,
    ) -> Result<Self, TokenError> {
        fn non_empty(v: Option<&[u8]>) -> Option<&[u8]> {
            v.filter(|b| !b.is_empty())
        }

        if let Some(secret) = non_empty(secret) {
            return Ok(Self::SharedSecret(secret.to_vec()));
        }

        match (non_empty(private_pem), non_empty(public_pem)) {
            (Some(private_pem), Some(public_pem)) => Ok(Self::RsaKeyPair {
                private_pem: private_pem.to_vec(),
                public_pem: public_pem.to_vec(),
            }),
            (Some(_), None) => Err(TokenError::Config("RSA private key supplied without public key".into())),
            (None, Some(_)) => Err(TokenError::Config("RSA public key supplied without private key".into())),
            (None, None) => Err(TokenError::Config("no shared secret or RSA key pair supplied".into())),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::SharedSecret(_) => Algorithm::HS512,
            Self::RsaKeyPair { .. } => Algorithm::RS512,
        }
    }
}

impl core::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SharedSecret(_) => f.write_str("SigningConfig::SharedSecret(<redacted>)"),
            Self::RsaKeyPair { .. } => f.write_str("SigningConfig::RsaKeyPair(<redacted>)"),
        }
    }
}

/// JWT-backed [`TokenIssuer`].
#[derive(Clone)]
pub struct JwtTokenIssuer {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtTokenIssuer {
    pub fn new(config: SigningConfig) -> Result<Self, TokenError> {
        let algorithm = config.algorithm();
        let (encoding, decoding) = match &config {
            SigningConfig::SharedSecret(secret) => {
                if secret.is_empty() {
                    return Err(TokenError::Config("shared secret is empty".into()));
                }
                (EncodingKey::from_secret(secret), DecodingKey::from_secret(secret))
            }
            SigningConfig::RsaKeyPair { private_pem, public_pem } => {
                let encoding = EncodingKey::from_rsa_pem(private_pem)
                    .map_err(|e| TokenError::Config(format!("unreadable RSA private key: {e}")))?;
                let decoding = DecodingKey::from_rsa_pem(public_pem)
                    .map_err(|e| TokenError::Config(format!("unreadable RSA public key: {e}")))?;
                (encoding, decoding)
            }
        };

        let issuer = Self {
            algorithm,
            encoding,
            decoding,
        };

        if algorithm == Algorithm::RS512 {
            issuer.check_key_pair()?;
        }

        tracing::info!(algorithm = ?algorithm, "token issuer configured");
        Ok(issuer)
    }

    /// Convenience for [`SigningConfig::select`] followed by [`JwtTokenIssuer::new`].
    pub fn from_parts(
        secret: Option<&[u8]>,
        private_pem: Option<&[u8]>,
        public_pem: Option<&[u8]>,
    ) -> Result<Self, TokenError> {
        Self::new(SigningConfig::select(secret, private_pem, public_pem)?)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Check signature and time window of a token this issuer minted.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<RegisteredClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // The window is checked below against the caller's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp", "nbf", "iat"]);

        let data = jsonwebtoken::decode::<RegisteredClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }

    fn signing_key(&self) -> Result<&EncodingKey, TokenError> {
        match self.algorithm {
            Algorithm::HS512 | Algorithm::RS512 => Ok(&self.encoding),
            other => Err(TokenError::Signing(format!("no key material for {other:?}"))),
        }
    }

    // A mismatched pair would mint tokens nobody can verify.
    fn check_key_pair(&self) -> Result<(), TokenError> {
        let probe = SessionClaims::new(warden_core::UserId::new(), "", Utc::now());
        let token = self
            .mint(&probe)
            .map_err(|e| TokenError::Config(format!("RSA private key cannot sign: {e}")))?;
        self.verify(&token, Utc::now())
            .map(|_| ())
            .map_err(|_| TokenError::Config("RSA public key does not match private key".into()))
    }
}

impl TokenIssuer for JwtTokenIssuer {
    #[tracing::instrument(skip(self, claims), fields(sub = %claims.sub, algorithm = ?self.algorithm), err)]
    fn mint(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        let key = self.signing_key()?;
        jsonwebtoken::encode(&Header::new(self.algorithm), &claims.registered(), key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl core::fmt::Debug for JwtTokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtTokenIssuer")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

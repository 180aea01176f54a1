//! Request pipeline shared by registration and authentication.
//!
//! validate -> store operation -> mint claims -> sign. The store and signing
//! stages run under one deadline; on expiry the in-flight work is dropped and
//! the caller gets [`ApiError::Timeout`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::instrument;

use warden_auth::{SessionClaims, TokenIssuer};
use warden_core::Credentials;
use warden_infra::UserStore;

use crate::app::errors::ApiError;

/// Which store operation produces the user id.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Register,
    Authenticate,
}

impl StoreOp {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreOp::Register => "register",
            StoreOp::Authenticate => "authenticate",
        }
    }
}

/// Everything a handler needs. Cheap to clone; handed to axum as router state.
#[derive(Clone)]
pub struct AuthPipeline {
    store: Arc<dyn UserStore>,
    issuer: Arc<dyn TokenIssuer>,
    timeout: Duration,
}

impl AuthPipeline {
    pub fn new(store: Arc<dyn UserStore>, issuer: Arc<dyn TokenIssuer>, timeout: Duration) -> Self {
        Self { store, issuer, timeout }
    }

    #[instrument(skip(self, credentials), fields(op = op.as_str(), email = %credentials.email), err(level = "warn", Display))]
    pub async fn run(&self, op: StoreOp, credentials: Credentials) -> Result<String, ApiError> {
        credentials.validate()?;

        match tokio::time::timeout(self.timeout, self.execute(op, &credentials)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "request deadline exceeded");
                Err(ApiError::Timeout)
            }
        }
    }

    async fn execute(&self, op: StoreOp, credentials: &Credentials) -> Result<String, ApiError> {
        let Credentials { email, password } = credentials;
        let user_id = match op {
            StoreOp::Register => self.store.register_user(email, password).await?,
            StoreOp::Authenticate => self.store.authenticate(email, password).await?,
        };

        let claims = SessionClaims::new(user_id, email.as_str(), Utc::now());
        self.issuer.mint(&claims).map_err(|e| {
            tracing::error!(error = %e, user_id = %claims.sub, "token signing failed");
            ApiError::Token
        })
    }
}

impl core::fmt::Debug for AuthPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthPipeline")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use warden_auth::{JwtTokenIssuer, SigningConfig, TokenError};
    use warden_core::UserId;
    use warden_infra::StoreError;

    use super::*;

    /// Records calls; registers every email once.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
        delay: Option<Duration>,
        fail_with: Option<StoreError>,
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn register_user(&self, _email: &str, _password: &str) -> Result<UserId, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(UserId::new()),
            }
        }

        async fn authenticate(&self, email: &str, password: &str) -> Result<UserId, StoreError> {
            self.register_user(email, password).await
        }
    }

    struct BrokenIssuer;

    impl TokenIssuer for BrokenIssuer {
        fn mint(&self, _claims: &SessionClaims) -> Result<String, TokenError> {
            Err(TokenError::Signing("hsm unplugged".into()))
        }
    }

    fn issuer() -> Arc<dyn TokenIssuer> {
        Arc::new(JwtTokenIssuer::new(SigningConfig::SharedSecret(b"SECRET!".to_vec())).unwrap())
    }

    fn pipeline(store: Arc<CountingStore>) -> AuthPipeline {
        AuthPipeline::new(store, issuer(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn success_yields_a_token() {
        let store = Arc::new(CountingStore::default());
        let token = pipeline(store.clone())
            .run(StoreOp::Register, Credentials::new("a@b.com", "pw1"))
            .await
            .unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_fields_never_reach_the_store() {
        let store = Arc::new(CountingStore::default());
        let p = pipeline(store.clone());

        let err = p.run(StoreOp::Register, Credentials::new("", "pw1")).await.unwrap_err();
        assert_eq!(err, ApiError::Validation("email is required".into()));
        let err = p.run(StoreOp::Authenticate, Credentials::new("a@b.com", "")).await.unwrap_err();
        assert_eq!(err, ApiError::Validation("password is required".into()));

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_errors_propagate_classified() {
        let store = Arc::new(CountingStore {
            fail_with: Some(StoreError::Conflict),
            ..Default::default()
        });
        let err = pipeline(store).run(StoreOp::Register, Credentials::new("a@b.com", "pw1")).await.unwrap_err();
        assert_eq!(err, ApiError::Conflict);
    }

    #[tokio::test]
    async fn signing_failure_is_reported_without_detail() {
        let store = Arc::new(CountingStore::default());
        let p = AuthPipeline::new(store, Arc::new(BrokenIssuer), Duration::from_secs(5));
        let err = p.run(StoreOp::Authenticate, Credentials::new("a@b.com", "pw1")).await.unwrap_err();
        assert_eq!(err, ApiError::Token);
        assert!(!err.to_string().contains("hsm"));
    }

    #[tokio::test]
    async fn slow_store_hits_the_deadline() {
        let store = Arc::new(CountingStore {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let p = AuthPipeline::new(store, issuer(), Duration::from_millis(50));
        let err = p.run(StoreOp::Register, Credentials::new("a@b.com", "pw1")).await.unwrap_err();
        assert_eq!(err, ApiError::Timeout);
    }
}

//! HTTP application wiring (Axum router + pipeline construction).
//!
//! - `pipeline.rs`: validate, store, mint, sign under one deadline
//! - `routes/`: HTTP handlers
//! - `dto.rs`: response bodies
//! - `errors.rs`: error classification and the JSON error envelope

use std::sync::Arc;

use axum::Router;

use warden_auth::{CredentialHasher, JwtTokenIssuer};
use warden_infra::{Config, build_user_store};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod pipeline;
pub mod routes;

use pipeline::AuthPipeline;

/// Build the full HTTP router around an already-constructed pipeline.
///
/// Every request, including rejected ones, gets a request id and an access-log line.
pub fn build_app(pipeline: AuthPipeline) -> Router {
    routes::router()
        .with_state(pipeline)
        .layer(axum::middleware::from_fn(middleware::request_context))
}

/// Construct the store and token issuer described by `config`.
///
/// Fails if the store cannot be initialized (unreachable database, bad
/// dataset) or the signing material is unusable.
pub async fn build_pipeline(config: &Config) -> anyhow::Result<AuthPipeline> {
    let issuer = JwtTokenIssuer::new(config.signing.clone())?;
    let store = build_user_store(config, CredentialHasher::new()).await?;
    Ok(AuthPipeline::new(store, Arc::new(issuer), config.timeout))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use warden_auth::{HashParams, SigningConfig};
    use warden_infra::InMemoryUserStore;

    use super::*;

    fn app() -> Router {
        let hasher = CredentialHasher::with_params(HashParams::new(HashParams::MIN_M_COST, 1, 1, None).unwrap());
        let store = Arc::new(InMemoryUserStore::new(hasher));
        let issuer = JwtTokenIssuer::new(SigningConfig::SharedSecret(b"SECRET!".to_vec())).unwrap();
        build_app(AuthPipeline::new(store, Arc::new(issuer), Duration::from_secs(5)))
    }

    fn post(uri: &str, body: &'static str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(res: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let res = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn every_response_carries_a_request_id() {
        let res = app().oneshot(post("/session", "not json")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let id = res.headers().get(&middleware::REQUEST_ID_HEADER).unwrap().to_str().unwrap();
        assert!(id.parse::<uuid::Uuid>().is_ok());
    }

    #[tokio::test]
    async fn caller_request_id_is_echoed() {
        let req = Request::get("/health")
            .header(&middleware::REQUEST_ID_HEADER, "trace-abc-123")
            .body(Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.headers().get(&middleware::REQUEST_ID_HEADER).unwrap(), "trace-abc-123");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let res = app().oneshot(post("/user", "{\"email\": ")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "validation_error");
    }

    #[tokio::test]
    async fn missing_password_is_a_bad_request() {
        let res = app().oneshot(post("/session", r#"{"email":"a@b.com"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["message"], "password is required");
    }

    #[tokio::test]
    async fn register_returns_created_with_token() {
        let res = app().oneshot(post("/user", r#"{"email":"a@b.com","password":"pw1"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = json_body(res).await;
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn unknown_user_is_unauthorized() {
        let res = app().oneshot(post("/session", r#"{"email":"a@b.com","password":"pw1"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(res).await;
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(body["message"], "invalid email/password combination");
    }
}

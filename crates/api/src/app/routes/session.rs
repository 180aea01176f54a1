//! `POST /user` and `POST /session`.
//!
//! Both take `{ "email": ..., "password": ... }` and answer `{ "token": ... }`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use warden_core::Credentials;

use crate::app::dto::TokenResponse;
use crate::app::errors::ApiError;
use crate::app::pipeline::{AuthPipeline, StoreOp};

pub async fn register(
    State(pipeline): State<AuthPipeline>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    handle(&pipeline, StoreOp::Register, StatusCode::CREATED, body).await
}

pub async fn authenticate(
    State(pipeline): State<AuthPipeline>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    handle(&pipeline, StoreOp::Authenticate, StatusCode::OK, body).await
}

async fn handle(
    pipeline: &AuthPipeline,
    op: StoreOp,
    success: StatusCode,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let Json(credentials) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(op = op.as_str(), error = %rejection, "rejected request body");
            return ApiError::Validation(rejection.body_text()).into_response();
        }
    };

    match pipeline.run(op, credentials).await {
        Ok(token) => (success, Json(TokenResponse { token })).into_response(),
        Err(e) => e.into_response(),
    }
}

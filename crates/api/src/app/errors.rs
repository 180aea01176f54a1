//! Error classification for the HTTP boundary.
//!
//! Every failure is rendered as `{ "error": <class>, "message": <text> }`.
//! Internal detail (backend messages, signing errors) is logged, never sent.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use warden_core::DomainError;
use warden_infra::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Malformed body or empty field.
    #[error("{0}")]
    Validation(String),

    #[error("user already exists")]
    Conflict,

    /// Unknown email and wrong password look the same to the client.
    #[error("invalid email/password combination")]
    Unauthorized,

    #[error("repository failure")]
    Repository,

    #[error("unable to create token")]
    Token,

    #[error("request timed out")]
    Timeout,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Repository | ApiError::Token => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Conflict => "conflict",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Repository => "repository_error",
            ApiError::Token => "unknown_error",
            ApiError::Timeout => "timeout",
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => ApiError::Validation(msg),
            StoreError::Conflict => ApiError::Conflict,
            StoreError::NotFound | StoreError::AuthFailed => ApiError::Unauthorized,
            StoreError::Hashing(_) | StoreError::Storage(_) | StoreError::Init(_) => {
                tracing::error!(error = %err, "credential store failure");
                ApiError::Repository
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status(), self.code(), self.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

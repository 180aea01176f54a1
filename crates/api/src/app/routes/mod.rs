use axum::{
    routing::{get, post},
    Router,
};

use crate::app::pipeline::AuthPipeline;

pub mod session;
pub mod system;

pub fn router() -> Router<AuthPipeline> {
    Router::new()
        .route("/user", post(session::register))
        .route("/session", post(session::authenticate))
        .route("/health", get(system::health))
}

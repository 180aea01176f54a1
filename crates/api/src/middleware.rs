use std::time::Instant;

use axum::{
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id plus one access-log line per request.
///
/// A caller-supplied `x-request-id` is kept when it is short, visible ASCII;
/// otherwise a fresh UUIDv7 is used. The id is echoed on the response and
/// recorded on a span that wraps the handler. Bodies are never logged.
pub async fn request_context(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_acceptable_id(v))
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let header_value = HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("invalid"));
    req.headers_mut().insert(REQUEST_ID_HEADER, header_value.clone());

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let span = tracing::info_span!("request", request_id = %request_id, method = %method, path = %path);

    async move {
        let started = Instant::now();
        let mut res = next.run(req).await;
        let status = res.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), elapsed_ms, "request completed");
        } else {
            tracing::info!(status = status.as_u16(), elapsed_ms, "request completed");
        }

        res.headers_mut().insert(REQUEST_ID_HEADER, header_value);
        res
    }
    .instrument(span)
    .await
}

fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN && id.bytes().all(|b| b.is_ascii_graphic())
}

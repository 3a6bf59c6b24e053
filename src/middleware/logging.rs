//! Request logging middleware
//! Assigns a UUID request id to every request and logs method, path,
//! status and latency on completion.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::info;
use uuid::Uuid;

/// Generates a fresh UUID v4 for the `x-request-id` header.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis();

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = latency_ms as u64,
        request_id = %request_id,
        "request completed"
    );

    response
}

//! Request id generation and per-request logging

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;

/// Generates a UUID v4 `x-request-id` for requests that arrive without one
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request id assigned to the current request, if any
#[derive(Debug, Clone, Default)]
pub struct CurrentRequestId(pub Option<String>);

impl CurrentRequestId {
    /// Stamp an error with this request's id
    pub fn tag(&self, error: AppError) -> AppError {
        match &self.0 {
            Some(id) => error.with_request_id(id.as_str()),
            None => error,
        }
    }
}

impl<S> FromRequestParts<S> for CurrentRequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentRequestId(get_request_id_from_headers(&parts.headers)))
    }
}

/// Log method, path, status and latency of every request
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = get_request_id_from_headers(request.headers()).unwrap_or_default();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    let _entered = span.enter();
    if response.status().is_server_error() {
        error!(status, latency_ms, "request failed");
    } else if response.status().is_client_error() {
        warn!(status, latency_ms, "request rejected");
    } else {
        info!(status, latency_ms, "request completed");
    }

    response
}

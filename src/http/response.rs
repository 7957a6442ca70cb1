//! Response relay back to the caller.
//!
//! # Responsibilities
//! - Copy every upstream header, keeping repeated headers as separate values
//! - Reply `200 OK` whatever status the upstream returned
//! - Stream the upstream body through without buffering
//!
//! # Design Decisions
//! - The status is normalized on purpose: callers tunnel arbitrary upstream
//!   responses as payload and read the real outcome from headers and body.
//!   This is not a status-mirroring proxy.
//! - Once headers are sent a body error cannot become a status code; the
//!   connection is torn down instead
//! - A body that stays silent longer than the idle timeout counts as a body
//!   error

use std::time::Duration;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::StatusCode;
use axum::response::Response;
use axum::BoxError;
use tower_http::timeout::TimeoutBody;

/// Turn an upstream response into the caller-facing response.
pub fn relay<B>(upstream: axum::http::Response<B>, body_idle: Option<Duration>) -> Response
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = upstream.into_parts();

    let body = match body_idle {
        Some(idle) => Body::new(TimeoutBody::new(idle, body)),
        None => Body::new(body),
    };

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    for (name, value) in parts.headers.iter() {
        headers.append(name.clone(), value.clone());
    }
    response
}

//! Request dispatch: verb table, prefix match, handler result, warnings.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use axum::body::{self, Body, Bytes};
use axum::http::{HeaderValue, Request, StatusCode};

use super::handler::MockRequest;
use super::response::MockResponse;
use super::state::MockState;

/// Buffer an inbound request so handlers can inspect it freely.
pub(crate) async fn buffer_request(request: Request<Body>) -> MockRequest {
    let (parts, incoming) = request.into_parts();
    let body = match body::to_bytes(incoming, usize::MAX).await {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(error = %err, "failed to read request body");
            Bytes::new()
        }
    };
    MockRequest::new(parts.method, parts.uri, parts.headers, body)
}

/// Produce the response for `request`.
///
/// Always returns a complete response: unmatched requests get the canned 404
/// and a panicking handler gets a 500.
pub(crate) fn respond(state: &MockState, request: &MockRequest) -> MockResponse {
    let Some(handler) = state.find_handler(request) else {
        tracing::debug!(
            method = %request.method(),
            path = request.path_and_query(),
            "no route matched"
        );
        return MockResponse::not_found();
    };

    tracing::debug!(
        method = %request.method(),
        path = request.path_and_query(),
        "route matched"
    );

    let mut response = MockResponse::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler(request).write_to(&mut response, request);
    }));
    if let Err(payload) = outcome {
        tracing::error!(
            method = %request.method(),
            path = request.path_and_query(),
            panic = panic_message(&*payload),
            "handler panicked"
        );
        response = MockResponse::new();
        response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    append_warnings(state, &mut response);
    response
}

/// The message a panic was raised with, when it carries one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

fn append_warnings(state: &MockState, response: &mut MockResponse) {
    for warning in state.warnings() {
        match HeaderValue::from_str(&warning) {
            Ok(value) => response.append_header(state.warning_header().clone(), value),
            Err(_) => tracing::warn!(%warning, "warning is not a valid header value, skipping"),
        }
    }
}

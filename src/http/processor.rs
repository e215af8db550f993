//! Adapter between route handlers and the transport.
//!
//! The processor gives every route the same failure path: a handler error or
//! panic is logged and replaced by a 500 response carrying the configured error
//! body. Whatever the outcome, the request body is drained before the response
//! head is produced, so a handler that ignores its input never leaves a
//! half-read request on a reused connection.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{extract::Request, response::Response};
use futures::FutureExt;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::http::error_body::ErrorBody;
use crate::http::request::RouteRequest;
use crate::http::response::{ResponseStatus, RouteResponse, RouteResponseBuilder};
use crate::routes::RouteHandler;

/// Wraps a [`RouteHandler`] for one route.
#[derive(Clone)]
pub struct RequestProcessor {
    handler: Arc<dyn RouteHandler>,
    error_body: ErrorBody,
}

impl RequestProcessor {
    pub fn new(handler: Arc<dyn RouteHandler>, error_body: ErrorBody) -> Self {
        Self {
            handler,
            error_body,
        }
    }

    /// Run the handler and turn its outcome into a transport response.
    ///
    /// Never fails because of the handler.
    pub async fn process(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let mut route_request = RouteRequest::from_parts(parts, body);

        let outcome = AssertUnwindSafe(self.handler.handle(&mut route_request))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Route handler failed");
                self.error_response()
            }
            Err(panic) => {
                tracing::error!(panic = panic_message(panic.as_ref()), "Route handler panicked");
                self.error_response()
            }
        };

        match route_request.drain().await {
            Ok(0) => {}
            Ok(drained) => {
                tracing::debug!(bytes = drained, "Drained unread request body");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to drain request body");
            }
        }

        send(response).await
    }

    fn error_response(&self) -> RouteResponse {
        RouteResponseBuilder::new()
            .set_status(ResponseStatus::Error)
            .set_body(self.error_body.body())
            .build()
    }
}

/// Write status, headers in insertion order, then the body.
///
/// `Content-Length` is the response's recorded length, or for a file body
/// the size of the file as opened.
async fn send(response: RouteResponse) -> Response {
    let status = StatusCode::from(response.status());
    let mut headers = HeaderMap::new();
    response.apply_headers(&mut headers);

    let recorded = response.length();
    let (body, opened) = response.into_body().open().await;
    if let Some(length) = recorded.or(opened) {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }

    let mut outbound = Response::new(body);
    *outbound.status_mut() = status;
    *outbound.headers_mut() = headers;
    outbound
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

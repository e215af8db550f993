//! Per-request tracing and correlation IDs.
//!
//! [`trace_request`] runs outside route dispatch. It assigns every request a
//! [`RequestId`], reusing a client-supplied `X-Request-Id` when it parses as a
//! UUID, and opens the `request` span that every log line of the request is
//! emitted in. The ID travels to the handler through the request extensions
//! ([`RouteRequest::request_id`](crate::RouteRequest::request_id)) and back to
//! the client in the `X-Request-Id` response header. Dispatch records the
//! matched route prefix on the span.

use std::fmt;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use http::{HeaderName, HeaderValue};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the request ID in both directions.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation ID of one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The ID named by the request's `X-Request-Id` header, if it is a UUID.
    fn from_header(value: Option<&HeaderValue>) -> Option<Self> {
        let value = value?.to_str().ok()?;
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    fn header_value(&self) -> HeaderValue {
        let mut buffer = Uuid::encode_buffer();
        // A hyphenated UUID is always a valid header value
        HeaderValue::from_str(self.0.hyphenated().encode_lower(&mut buffer))
            .unwrap_or_else(|_| HeaderValue::from_static("invalid"))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Assign the request ID and wrap the request in its span.
pub async fn trace_request(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_header(request.headers().get(&REQUEST_ID_HEADER))
        .unwrap_or_default();
    request.extensions_mut().insert(request_id);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        route = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    );

    let start = Instant::now();
    async move {
        let mut response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::info!(status = response.status().as_u16(), "Request completed");

        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, request_id.header_value());
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_id_must_be_uuid() {
        let id = Uuid::new_v4();
        let value = HeaderValue::from_str(&id.to_string()).unwrap();
        assert_eq!(RequestId::from_header(Some(&value)), Some(RequestId(id)));

        let value = HeaderValue::from_static("not-a-uuid");
        assert_eq!(RequestId::from_header(Some(&value)), None);
        assert_eq!(RequestId::from_header(None), None);
    }

    #[test]
    fn test_header_value_is_hyphenated_uuid() {
        let id = RequestId::new();
        assert_eq!(id.header_value(), id.to_string().as_str());
    }
}

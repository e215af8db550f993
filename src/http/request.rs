//! Read-only request view handed to route handlers.

use std::fmt;

use axum::body::{Body, BodyDataStream, Bytes};
use futures::StreamExt;
use http::request::Parts;
use http::{HeaderMap, Uri};

use crate::middleware::RequestId;

/// Request methods known to route handlers.
///
/// Anything other than GET is classified as POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl From<&http::Method> for Method {
    fn from(method: &http::Method) -> Self {
        if method == http::Method::GET {
            Method::Get
        } else {
            Method::Post
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Error reading the request body
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("Failed to read request body: {0}")]
    Read(#[from] axum::Error),

    #[error("Request body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// A single inbound request.
///
/// The body is not buffered; handlers pull it chunk by chunk. Whatever a
/// handler leaves unread is drained by the request processor.
pub struct RouteRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    request_id: Option<RequestId>,
    body: BodyDataStream,
}

impl RouteRequest {
    pub fn new(method: &http::Method, uri: Uri, headers: HeaderMap, body: Body) -> Self {
        Self {
            method: Method::from(method),
            uri,
            headers,
            request_id: None,
            body: body.into_data_stream(),
        }
    }

    /// Build from a transport request, keeping the ID assigned by the
    /// request tracing middleware.
    pub fn from_parts(parts: Parts, body: Body) -> Self {
        let request_id = parts.extensions.get::<RequestId>().copied();
        Self {
            request_id,
            ..Self::new(&parts.method, parts.uri, parts.headers, body)
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Correlation ID, also sent back in the `X-Request-Id` response header.
    ///
    /// `None` when the request did not pass through the server's router.
    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Direct access to the body stream.
    pub fn body_mut(&mut self) -> &mut BodyDataStream {
        &mut self.body
    }

    /// Next chunk of the body, `None` once exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, BodyError> {
        Ok(self.body.next().await.transpose()?)
    }

    /// Read the remaining body into memory, failing past `limit` bytes.
    pub async fn read_to_bytes(&mut self, limit: usize) -> Result<Bytes, BodyError> {
        let mut buffer = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            if buffer.len() + chunk.len() > limit {
                return Err(BodyError::TooLarge { limit });
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buffer))
    }

    /// Discard the rest of the body. Returns the number of bytes skipped.
    pub async fn drain(&mut self) -> Result<u64, BodyError> {
        let mut drained = 0u64;
        while let Some(chunk) = self.next_chunk().await? {
            drained += chunk.len() as u64;
        }
        Ok(drained)
    }
}

impl fmt::Debug for RouteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: http::Method, body: &'static str) -> RouteRequest {
        RouteRequest::new(
            &method,
            Uri::from_static("/upload?name=a"),
            HeaderMap::new(),
            Body::from(body),
        )
    }

    #[test]
    fn test_non_get_methods_are_post() {
        assert_eq!(Method::from(&http::Method::GET), Method::Get);
        assert_eq!(Method::from(&http::Method::POST), Method::Post);
        assert_eq!(Method::from(&http::Method::PUT), Method::Post);
        assert_eq!(Method::from(&http::Method::DELETE), Method::Post);
    }

    #[test]
    fn test_path_excludes_query() {
        let request = request(http::Method::GET, "");
        assert_eq!(request.path(), "/upload");
        assert_eq!(request.uri().query(), Some("name=a"));
    }

    #[test]
    fn test_from_parts_keeps_request_id() {
        let id = RequestId::new();
        let (parts, body) = http::Request::builder()
            .method("DELETE")
            .uri("/items/7")
            .extension(id)
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let request = RouteRequest::from_parts(parts, body);
        assert_eq!(request.request_id(), Some(id));
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.path(), "/items/7");

        assert_eq!(self::request(http::Method::GET, "").request_id(), None);
    }

    #[tokio::test]
    async fn test_read_to_bytes() {
        let mut request = request(http::Method::POST, "hello");
        assert_eq!(request.read_to_bytes(1024).await.unwrap(), Bytes::from("hello"));
        assert_eq!(request.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_to_bytes_enforces_limit() {
        let mut request = request(http::Method::POST, "hello world");
        let err = request.read_to_bytes(4).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn test_drain_counts_remaining_bytes() {
        let mut request = request(http::Method::POST, "hello world");
        assert_eq!(request.drain().await.unwrap(), 11);
        assert_eq!(request.drain().await.unwrap(), 0);
    }
}

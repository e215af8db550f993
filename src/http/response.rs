//! Immutable route responses and their persistent builder.
//!
//! Every builder setter returns a new builder; the receiver is left untouched
//! and unchanged fields are shared. Headers keep the order they were added in
//! and are applied in that order when the response is sent: `Set` replaces
//! every earlier value under the key, `Add` appends another value.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use futures::stream;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio::io::AsyncReadExt;

use crate::config::FILE_CHUNK_SIZE;

/// Known response statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    #[default]
    Ok,
    Moved,
    Error,
}

impl ResponseStatus {
    pub fn code(&self) -> u16 {
        match self {
            ResponseStatus::Ok => 200,
            ResponseStatus::Moved => 301,
            ResponseStatus::Error => 500,
        }
    }
}

impl From<ResponseStatus> for StatusCode {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Ok => StatusCode::OK,
            ResponseStatus::Moved => StatusCode::MOVED_PERMANENTLY,
            ResponseStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Whether a header replaces earlier values or adds to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderMode {
    Add,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub mode: HeaderMode,
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl ResponseHeader {
    /// Apply this header to an outgoing header map.
    pub fn apply(&self, headers: &mut HeaderMap) {
        match self.mode {
            HeaderMode::Set => {
                headers.insert(self.name.clone(), self.value.clone());
            }
            HeaderMode::Add => {
                headers.append(self.name.clone(), self.value.clone());
            }
        }
    }
}

/// Source of a response body.
///
/// File bodies are opened and sized lazily when the response is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseBody {
    #[default]
    Empty,
    Bytes(Bytes),
    File(PathBuf),
}

impl ResponseBody {
    /// Length of an in-memory body. `None` for files, which are only sized
    /// when opened.
    pub fn known_length(&self) -> Option<u64> {
        match self {
            ResponseBody::Empty => Some(0),
            ResponseBody::Bytes(bytes) => Some(bytes.len() as u64),
            ResponseBody::File(_) => None,
        }
    }

    /// Open the body for sending.
    ///
    /// Returns the body and its exact length when known. A file that cannot be
    /// opened becomes an empty body.
    pub async fn open(self) -> (Body, Option<u64>) {
        match self {
            ResponseBody::Empty => (Body::empty(), Some(0)),
            ResponseBody::Bytes(bytes) => {
                let length = bytes.len() as u64;
                (Body::from(bytes), Some(length))
            }
            ResponseBody::File(path) => match open_file(&path).await {
                Ok((file, length)) => (file_body(file), Some(length)),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Response body file unavailable, sending empty body"
                    );
                    (Body::empty(), Some(0))
                }
            },
        }
    }
}

async fn open_file(path: &Path) -> std::io::Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    Ok((file, length))
}

fn file_body(file: tokio::fs::File) -> Body {
    let chunks = stream::try_unfold(file, |mut file| async move {
        let mut buffer = vec![0u8; FILE_CHUNK_SIZE];
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buffer.truncate(read);
        Ok(Some((Bytes::from(buffer), file)))
    });
    Body::from_stream(chunks)
}

/// A built response, sent exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResponse {
    status: ResponseStatus,
    length: Option<u64>,
    body: ResponseBody,
    headers: Arc<Vec<ResponseHeader>>,
}

impl RouteResponse {
    pub fn builder() -> RouteResponseBuilder {
        RouteResponseBuilder::new()
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Body length in bytes as known when the response was built, `None`
    /// for a file body. The sender uses it for `Content-Length` and sizes a
    /// file body when opening it.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Headers in the order they were added.
    pub fn headers(&self) -> &[ResponseHeader] {
        &self.headers
    }

    /// Apply every header, in order, to an outgoing header map.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        for header in self.headers.iter() {
            header.apply(headers);
        }
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }
}

/// Persistent builder for [`RouteResponse`].
///
/// Defaults to status 200, an empty body and no headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResponseBuilder {
    status: ResponseStatus,
    length: Option<u64>,
    body: ResponseBody,
    headers: Arc<Vec<ResponseHeader>>,
}

impl Default for RouteResponseBuilder {
    fn default() -> Self {
        Self {
            status: ResponseStatus::Ok,
            length: Some(0),
            body: ResponseBody::Empty,
            headers: Arc::default(),
        }
    }
}

impl RouteResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: ResponseStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Use a string as the body.
    pub fn set_content(&self, content: impl Into<String>) -> Self {
        self.set_bytes(Bytes::from(content.into()))
    }

    /// Use raw bytes as the body.
    pub fn set_bytes(&self, content: impl Into<Bytes>) -> Self {
        self.set_body(ResponseBody::Bytes(content.into()))
    }

    /// Use a file as the body.
    ///
    /// The file is opened and sized when the response is sent; a missing
    /// file yields an empty body.
    pub fn set_file(&self, path: impl Into<PathBuf>) -> Self {
        self.set_body(ResponseBody::File(path.into()))
    }

    /// Use any body source.
    pub fn set_body(&self, body: ResponseBody) -> Self {
        Self {
            length: body.known_length(),
            body,
            ..self.clone()
        }
    }

    /// Append a value under `name`, keeping earlier values.
    pub fn add_header(&self, name: HeaderName, value: HeaderValue) -> Self {
        self.push_header(HeaderMode::Add, name, value)
    }

    /// Replace every earlier value under `name`.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) -> Self {
        self.push_header(HeaderMode::Set, name, value)
    }

    fn push_header(&self, mode: HeaderMode, name: HeaderName, value: HeaderValue) -> Self {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        headers.extend(self.headers.iter().cloned());
        headers.push(ResponseHeader { mode, name, value });
        Self {
            headers: Arc::new(headers),
            ..self.clone()
        }
    }

    pub fn build(&self) -> RouteResponse {
        RouteResponse {
            status: self.status,
            length: self.length,
            body: self.body.clone(),
            headers: Arc::clone(&self.headers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::LOCATION;

    const X: HeaderName = HeaderName::from_static("x-test");

    #[test]
    fn test_builder_defaults() {
        let response = RouteResponseBuilder::new().build();
        assert_eq!(response.status(), ResponseStatus::Ok);
        assert_eq!(response.length(), Some(0));
        assert_eq!(response.body(), &ResponseBody::Empty);
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_setters_leave_receiver_untouched() {
        let base = RouteResponseBuilder::new().set_content("hello");
        let moved = base.set_status(ResponseStatus::Moved);
        let with_header = base.add_header(LOCATION, HeaderValue::from_static("/"));

        assert_eq!(base.build().status(), ResponseStatus::Ok);
        assert!(base.build().headers().is_empty());
        assert_eq!(moved.build().status(), ResponseStatus::Moved);
        assert_eq!(moved.build().length(), Some(5));
        assert_eq!(with_header.build().headers().len(), 1);
    }

    #[test]
    fn test_content_sets_length() {
        let response = RouteResponseBuilder::new().set_content("héllo").build();
        assert_eq!(response.length(), Some(6));
        assert_eq!(response.body(), &ResponseBody::Bytes(Bytes::from("héllo")));
    }

    #[test]
    fn test_add_then_set_keeps_both_entries_in_order() {
        let response = RouteResponseBuilder::new()
            .set_status(ResponseStatus::Ok)
            .set_content("hello")
            .add_header(X, HeaderValue::from_static("a"))
            .set_header(X, HeaderValue::from_static("b"))
            .build();

        let headers = response.headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].mode, HeaderMode::Add);
        assert_eq!(headers[0].value, "a");
        assert_eq!(headers[1].mode, HeaderMode::Set);
        assert_eq!(headers[1].value, "b");
        assert!(headers.iter().all(|h| h.name == X));

        let mut applied = HeaderMap::new();
        response.apply_headers(&mut applied);
        let values: Vec<_> = applied.get_all(X).iter().collect();
        assert_eq!(values, vec!["b"]);
    }

    #[test]
    fn test_repeated_adds_are_not_deduplicated() {
        let response = RouteResponseBuilder::new()
            .set_header(X, HeaderValue::from_static("a"))
            .add_header(X, HeaderValue::from_static("b"))
            .add_header(X, HeaderValue::from_static("b"))
            .build();

        let mut applied = HeaderMap::new();
        response.apply_headers(&mut applied);
        let values: Vec<_> = applied.get_all(X).iter().collect();
        assert_eq!(values, vec!["a", "b", "b"]);
    }

    #[test]
    fn test_set_file_defers_length() {
        let response = RouteResponseBuilder::new()
            .set_content("replaced")
            .set_file("/definitely/not/here.html")
            .build();
        assert_eq!(response.length(), None);
    }

    #[tokio::test]
    async fn test_file_body_streams_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<p>page</p>").unwrap();

        let response = RouteResponseBuilder::new().set_file(&path).build();
        assert_eq!(response.length(), None);

        let (body, length) = response.into_body().open().await;
        assert_eq!(length, Some(11));
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(bytes, Bytes::from("<p>page</p>"));
    }

    #[tokio::test]
    async fn test_missing_file_opens_as_empty_body() {
        let (body, length) = ResponseBody::File(PathBuf::from("/definitely/not/here.html"))
            .open()
            .await;
        assert_eq!(length, Some(0));
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}

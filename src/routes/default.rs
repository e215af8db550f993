//! Built-in handler for the root route.
//!
//! Serves a fixed HTML page so a freshly built server answers on `/` before
//! any application routes are registered.

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::HeaderValue;

use crate::config::DEFAULT_PAGE;
use crate::error::HandlerError;
use crate::http::request::RouteRequest;
use crate::http::response::{ResponseStatus, RouteResponse, RouteResponseBuilder};
use crate::routes::RouteHandler;

/// Handler returning the built-in "running" page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

#[async_trait]
impl RouteHandler for DefaultHandler {
    async fn handle(&self, _request: &mut RouteRequest) -> Result<RouteResponse, HandlerError> {
        Ok(RouteResponseBuilder::new()
            .set_status(ResponseStatus::Ok)
            .set_header(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))
            .set_content(DEFAULT_PAGE)
            .build())
    }
}

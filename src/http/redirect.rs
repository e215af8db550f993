//! HTTP to HTTPS redirect listener.
//!
//! The plain HTTP listener serves a single route, `/`, whose handler answers
//! every request with a permanent redirect to the same path on the configured
//! HTTPS domain. It goes through the same processor as the HTTPS routes, so
//! request bodies are drained and failures logged the same way.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use http::header::{CONTENT_TYPE, LOCATION};
use http::HeaderValue;

use crate::config::REDIRECT_BODY;
use crate::error::HandlerError;
use crate::http::error_body::ErrorBody;
use crate::http::request::RouteRequest;
use crate::http::response::{ResponseStatus, RouteResponse, RouteResponseBuilder};
use crate::routes::{create_router, RouteHandler, RouteTable, Routes};

/// Redirects every request to `https://{domain}{path}`.
#[derive(Debug, Clone)]
pub struct RedirectHandler {
    domain: String,
}

impl RedirectHandler {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    pub fn location(&self, path: &str) -> String {
        format!("https://{}{}", self.domain, path)
    }
}

#[async_trait]
impl RouteHandler for RedirectHandler {
    async fn handle(&self, request: &mut RouteRequest) -> Result<RouteResponse, HandlerError> {
        let location = self.location(request.path());
        tracing::debug!(from = %request.path(), to = %location, "Redirecting HTTP to HTTPS");

        let location = HeaderValue::try_from(location)?;
        Ok(RouteResponseBuilder::new()
            .set_status(ResponseStatus::Moved)
            .set_header(LOCATION, location)
            .set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .set_content(REDIRECT_BODY)
            .build())
    }
}

/// Router for the redirect listener.
pub fn create_redirect_router(domain: &str) -> Router {
    let mut routes = Routes::new();
    routes.insert(
        "/".to_string(),
        Arc::new(RedirectHandler::new(domain)) as Arc<dyn RouteHandler>,
    );
    create_router(Arc::new(RouteTable::new(&routes, &ErrorBody::Default)))
}

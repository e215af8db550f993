//! Route handlers and prefix-based dispatch.
//!
//! Routes map a path prefix to a [`RouteHandler`]; the longest prefix that
//! matches the request path wins, compared as plain strings. Each handler is
//! wrapped in a [`RequestProcessor`] when the table is built, so every route
//! shares the same failure handling.
//!
//! Every request passes through [`trace_request`] first, so dispatch, the
//! handler and the processor all log inside the request's span.

pub mod default;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Router,
};

use crate::error::HandlerError;
use crate::http::error_body::ErrorBody;
use crate::http::processor::RequestProcessor;
use crate::http::request::RouteRequest;
use crate::http::response::RouteResponse;
use crate::middleware::trace_request;

pub use default::DefaultHandler;

/// Application logic for one route.
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    /// Produce a response for `request`.
    ///
    /// Errors and panics become the configured error response.
    async fn handle(&self, request: &mut RouteRequest) -> Result<RouteResponse, HandlerError>;
}

/// Routes keyed by path prefix, as configured on the builder.
pub type Routes = BTreeMap<String, Arc<dyn RouteHandler>>;

/// Immutable dispatch table of processors ordered by descending prefix length.
pub struct RouteTable {
    routes: Vec<(String, RequestProcessor)>,
}

impl RouteTable {
    pub fn new(routes: &Routes, error_body: &ErrorBody) -> Self {
        let mut routes: Vec<_> = routes
            .iter()
            .map(|(prefix, handler)| {
                (
                    prefix.clone(),
                    RequestProcessor::new(Arc::clone(handler), error_body.clone()),
                )
            })
            .collect();
        routes.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        Self { routes }
    }

    /// Processor for the longest route that prefixes `path`.
    pub fn resolve(&self, path: &str) -> Option<(&str, &RequestProcessor)> {
        self.routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(prefix, processor)| (prefix.as_str(), processor))
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(prefix, _)| prefix.as_str())
    }
}

/// Creates the Axum router that dispatches every request through the table.
pub fn create_router(table: Arc<RouteTable>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(table)
        // Outermost, so the request span covers dispatch
        .layer(middleware::from_fn(trace_request))
}

async fn dispatch(State(table): State<Arc<RouteTable>>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    match table.resolve(&path) {
        Some((prefix, processor)) => {
            tracing::Span::current().record("route", prefix);
            tracing::debug!(route = %prefix, "Dispatching request");
            processor.process(request).await
        }
        None => {
            tracing::debug!(%path, "No route matches request");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

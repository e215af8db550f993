//! hotcert - an embeddable HTTPS server with certificate hot reload
//!
//! A [`WebServer`] serves prefix-routed [`RouteHandler`]s over TLS 1.3 and
//! watches its keystore file. When the keystore content changes the server
//! restarts itself with the new certificate; if the new keystore is unusable
//! it stops instead of serving a stale one.

pub mod builder;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod watcher;

pub use builder::WebServerBuilder;
pub use error::{BindError, HandlerError, HashError, ServerError, TlsError};
pub use http::{
    ErrorBody, HeaderMode, Method, ResponseBody, ResponseHeader, ResponseStatus, RouteRequest,
    RouteResponse, RouteResponseBuilder, ServerState, WebServer,
};
pub use middleware::RequestId;
pub use routes::{DefaultHandler, RouteHandler};
pub use watcher::HashWatcher;

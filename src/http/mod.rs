//! HTTPS server with keystore hot reload.
//!
//! This module provides:
//! - The request/response model handed to route handlers
//! - The request processor that turns handler failures into error pages
//! - TLS context construction from a PEM keystore (TLS 1.3 only)
//! - The server lifecycle: start, stop and restart on keystore change
//! - An optional HTTP listener that redirects to HTTPS
//! - Signal handling for hosting processes

pub mod error_body;
pub mod listener;
pub mod processor;
pub mod redirect;
pub mod request;
pub mod response;
pub mod server;
pub mod shutdown;
pub mod tls;

pub use error_body::ErrorBody;
pub use request::{Method, RouteRequest};
pub use response::{HeaderMode, ResponseBody, ResponseHeader, ResponseStatus, RouteResponse, RouteResponseBuilder};
pub use server::{ServerState, WebServer};

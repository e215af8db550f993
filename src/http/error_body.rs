//! Body served in place of a failed handler's response.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;

use crate::config::DEFAULT_ERROR_PAGE;
use crate::http::response::ResponseBody;

/// Supplier of the error page body.
#[derive(Clone, Default)]
pub enum ErrorBody {
    /// Built-in HTML error page
    #[default]
    Default,
    Text(Bytes),
    /// Read at send time; a missing file sends an empty body
    File(PathBuf),
    Supplier(Arc<dyn Fn() -> ResponseBody + Send + Sync>),
}

impl ErrorBody {
    pub fn from_fn<F>(supplier: F) -> Self
    where
        F: Fn() -> ResponseBody + Send + Sync + 'static,
    {
        ErrorBody::Supplier(Arc::new(supplier))
    }

    /// Produce a fresh body for one error response.
    pub fn body(&self) -> ResponseBody {
        match self {
            ErrorBody::Default => ResponseBody::Bytes(Bytes::from_static(DEFAULT_ERROR_PAGE.as_bytes())),
            ErrorBody::Text(text) => ResponseBody::Bytes(text.clone()),
            ErrorBody::File(path) => ResponseBody::File(path.clone()),
            ErrorBody::Supplier(supplier) => supplier(),
        }
    }
}

impl fmt::Debug for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Default => write!(f, "Default"),
            ErrorBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ErrorBody::File(path) => f.debug_tuple("File").field(path).finish(),
            ErrorBody::Supplier(_) => write!(f, "Supplier(..)"),
        }
    }
}

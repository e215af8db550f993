//! Construction of a [`WebServer`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;

use crate::config::{
    RedirectConfig, ServerConfig, DEFAULT_HOST, DEFAULT_HTTPS_PORT, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_SHUTDOWN_GRACE_SECS,
};
use crate::error::ServerError;
use crate::http::error_body::ErrorBody;
use crate::http::server::{ServerSettings, WebServer};
use crate::routes::{DefaultHandler, RouteHandler, Routes};

/// Builder for [`WebServer`].
///
/// Starts with the default `/` route serving the built-in page. A keystore is
/// required; everything else has a default.
///
/// ```no_run
/// # async fn run() -> Result<(), hotcert::ServerError> {
/// let server = hotcert::WebServerBuilder::new()
///     .keystore("/etc/hotcert/keystore.pem", "")
///     .port(8443)
///     .build()?;
/// server.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct WebServerBuilder {
    keystore: Option<(PathBuf, String)>,
    host: String,
    port: u16,
    shutdown_grace: Duration,
    poll_interval: Duration,
    redirect: Option<RedirectConfig>,
    routes: Routes,
    error_body: ErrorBody,
}

impl std::fmt::Debug for WebServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebServerBuilder")
            .field("keystore", &self.keystore.as_ref().map(|(path, _)| path))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("poll_interval", &self.poll_interval)
            .field("redirect", &self.redirect)
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("error_body", &self.error_body)
            .finish()
    }
}

impl Default for WebServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WebServerBuilder {
    pub fn new() -> Self {
        let mut routes = Routes::new();
        routes.insert("/".to_string(), Arc::new(DefaultHandler));
        Self {
            keystore: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_HTTPS_PORT,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            redirect: None,
            routes,
            error_body: ErrorBody::Default,
        }
    }

    /// Apply every setting from a loaded configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut builder = Self::new()
            .keystore(config.tls.keystore.clone(), config.tls.password.clone())
            .host(config.http.host.clone())
            .port(config.http.port)
            .shutdown_grace(Duration::from_secs(config.http.shutdown_grace_seconds))
            .poll_interval(Duration::from_secs(config.watcher.poll_interval_seconds));
        if let Some(redirect) = &config.http.redirect {
            builder = builder.redirect(redirect.port, redirect.domain.clone());
        }
        if let Some(error_page) = &config.pages.error_page {
            builder = builder.error_body_file(error_page.clone());
        }
        builder
    }

    /// PEM keystore and its password (empty for none).
    pub fn keystore(mut self, path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        self.keystore = Some((path.into(), password.into()));
        self
    }

    /// Host resolved at every start; the first address wins.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// How often the keystore is re-hashed. Must be non-zero.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Also listen for plain HTTP on `port`, redirecting to `https://{domain}`.
    pub fn redirect(mut self, port: u16, domain: impl Into<String>) -> Self {
        self.redirect = Some(RedirectConfig {
            port,
            domain: domain.into(),
        });
        self
    }

    /// Serve `route` and everything under it with `handler`, replacing any
    /// handler already registered for the same route.
    pub fn handler(mut self, route: impl Into<String>, handler: impl RouteHandler) -> Self {
        self.routes.insert(route.into(), Arc::new(handler));
        self
    }

    pub fn error_body(mut self, error_body: ErrorBody) -> Self {
        self.error_body = error_body;
        self
    }

    pub fn error_body_text(self, text: impl Into<Bytes>) -> Self {
        self.error_body(ErrorBody::Text(text.into()))
    }

    /// Serve the file's contents on errors. A missing file sends an empty body.
    pub fn error_body_file(self, path: impl Into<PathBuf>) -> Self {
        self.error_body(ErrorBody::File(path.into()))
    }

    /// Build the server, hashing the keystore for change detection.
    pub fn build(self) -> Result<WebServer, ServerError> {
        let (keystore, password) = self.keystore.ok_or(ServerError::MissingKeystore)?;
        if self.poll_interval.is_zero() {
            return Err(ServerError::InvalidSetting(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        let settings = ServerSettings {
            keystore,
            password,
            host: self.host,
            port: self.port,
            shutdown_grace: self.shutdown_grace,
            poll_interval: self.poll_interval,
            redirect: self.redirect,
        };
        tracing::debug!(
            keystore = %settings.keystore.display(),
            host = %settings.host,
            port = settings.port,
            routes = self.routes.len(),
            "Building server"
        );
        WebServer::new(settings, &self.routes, &self.error_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::HandlerError;
    use crate::http::request::RouteRequest;
    use crate::http::response::{RouteResponse, RouteResponseBuilder};

    struct Ok200;

    #[async_trait]
    impl RouteHandler for Ok200 {
        async fn handle(&self, _request: &mut RouteRequest) -> Result<RouteResponse, HandlerError> {
            Ok(RouteResponseBuilder::new().build())
        }
    }

    #[test]
    fn test_new_registers_default_route() {
        let builder = WebServerBuilder::new();
        assert_eq!(builder.routes.keys().collect::<Vec<_>>(), vec!["/"]);
        assert_eq!(builder.port, DEFAULT_HTTPS_PORT);
        assert_eq!(builder.host, DEFAULT_HOST);
    }

    #[test]
    fn test_handler_replaces_same_route() {
        let builder = WebServerBuilder::new()
            .handler("/", Ok200)
            .handler("/api", Ok200);
        assert_eq!(builder.routes.len(), 2);
    }

    #[test]
    fn test_build_without_keystore_fails() {
        let err = WebServerBuilder::new().build().unwrap_err();
        assert!(matches!(err, ServerError::MissingKeystore));
    }

    #[test]
    fn test_build_with_unreadable_keystore_fails_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let err = WebServerBuilder::new()
            .keystore(dir.path().join("absent.pem"), "")
            .build()
            .unwrap_err();
        assert!(matches!(err, ServerError::Hashing(_)));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = dir.path().join("keystore.pem");
        std::fs::write(&keystore, "unused").unwrap();

        let err = WebServerBuilder::new()
            .keystore(&keystore, "")
            .poll_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidSetting(ref msg) if msg.contains("poll interval")));

        let built = WebServerBuilder::new()
            .keystore(&keystore, "")
            .poll_interval(Duration::from_millis(1))
            .build();
        assert!(built.is_ok());
    }

    #[test]
    fn test_from_config_applies_every_section() {
        let config = ServerConfig::parse(
            r#"
            [http]
            host = "127.0.0.1"
            port = 8443
            shutdown_grace_seconds = 2

            [http.redirect]
            port = 8080
            domain = "example.com"

            [tls]
            keystore = "/etc/hotcert/keystore.pem"

            [watcher]
            poll_interval_seconds = 3

            [pages]
            error_page = "/srv/500.html"
            "#,
        )
        .unwrap();

        let builder = WebServerBuilder::from_config(&config);

        assert_eq!(
            builder.keystore,
            Some((PathBuf::from("/etc/hotcert/keystore.pem"), String::new()))
        );
        assert_eq!(builder.host, "127.0.0.1");
        assert_eq!(builder.port, 8443);
        assert_eq!(builder.shutdown_grace, Duration::from_secs(2));
        assert_eq!(builder.poll_interval, Duration::from_secs(3));
        assert_eq!(
            builder.redirect,
            Some(RedirectConfig {
                port: 8080,
                domain: "example.com".to_string()
            })
        );
        assert!(matches!(builder.error_body, ErrorBody::File(ref p) if p == &PathBuf::from("/srv/500.html")));
    }
}

//! Configuration loading and constants.
//!
//! Loads server configuration from TOML files and defines the defaults for
//! ports, polling, shutdown grace, logging, and the built-in HTML pages.
//! `ServerConfig` is the root configuration struct containing all settings.

use const_format::formatcp;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// =============================================================================
// Network Defaults
// =============================================================================

/// Default host resolved for the listening sockets
pub const DEFAULT_HOST: &str = "localhost";

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Default port for the HTTP->HTTPS redirect listener
pub const DEFAULT_REDIRECT_PORT: u16 = 80;

/// Seconds `stop()` waits for in-flight requests before closing connections
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Backlog for listening sockets
pub const LISTEN_BACKLOG: i32 = 128;

// =============================================================================
// Keystore Watching
// =============================================================================

/// Seconds between keystore digest checks
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

// =============================================================================
// Response Streaming
// =============================================================================

/// Read size when streaming file bodies
pub const FILE_CHUNK_SIZE: usize = 16 * 1024;

// =============================================================================
// Built-in Pages
// =============================================================================

/// Product name shown on built-in pages
pub const PRODUCT_NAME: &str = "hotcert";

/// Body served by the default `/` route
pub const DEFAULT_PAGE: &str = formatcp!(
    "<!DOCTYPE html>\n\
     <html lang=\"en\">\n\
     \x20 <head>\n\
     \x20   <meta charset=\"UTF-8\">\n\
     \x20   <title>{name}</title>\n\
     \x20 </head>\n\
     \x20 <body>\n\
     \x20   <p>{name} is running</p>\n\
     \x20 </body>\n\
     </html>",
    name = PRODUCT_NAME
);

/// Body served when a route handler fails
pub const DEFAULT_ERROR_PAGE: &str = formatcp!(
    "<!DOCTYPE html>\n\
     <html lang=\"en\">\n\
     \x20 <head>\n\
     \x20   <meta charset=\"UTF-8\">\n\
     \x20   <title>Internal Error</title>\n\
     \x20 </head>\n\
     \x20 <body>\n\
     \x20   <p>{name} experienced an internal error.</p>\n\
     \x20 </body>\n\
     </html>",
    name = PRODUCT_NAME
);

/// Body sent alongside a redirect
pub const REDIRECT_BODY: &str = "redirecting to https";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/hotcert.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "hotcert=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Listener configuration
    #[serde(default)]
    pub http: HttpConfig,
    /// Keystore configuration
    pub tls: TlsConfig,
    /// Keystore watcher configuration
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Built-in page overrides
    #[serde(default)]
    pub pages: PagesConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTPS listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpConfig::default_port")]
    pub port: u16,
    /// Grace period for in-flight requests when stopping
    #[serde(default = "HttpConfig::default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// Optional HTTP listener that redirects everything to HTTPS
    #[serde(default)]
    pub redirect: Option<RedirectConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            shutdown_grace_seconds: Self::default_shutdown_grace(),
            redirect: None,
        }
    }
}

impl HttpConfig {
    fn default_host() -> String {
        DEFAULT_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_HTTPS_PORT
    }

    fn default_shutdown_grace() -> u64 {
        DEFAULT_SHUTDOWN_GRACE_SECS
    }
}

/// HTTP->HTTPS redirect listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedirectConfig {
    #[serde(default = "RedirectConfig::default_port")]
    pub port: u16,
    /// Domain used to build the `Location` header
    pub domain: String,
}

impl RedirectConfig {
    fn default_port() -> u16 {
        DEFAULT_REDIRECT_PORT
    }
}

/// Keystore configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    /// PEM bundle holding the certificate chain and private key
    pub keystore: PathBuf,
    /// Keystore password (empty string if none)
    #[serde(default)]
    pub password: String,
}

/// Keystore watcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "WatcherConfig::default_poll_interval")]
    pub poll_interval_seconds: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: Self::default_poll_interval(),
        }
    }
}

impl WatcherConfig {
    fn default_poll_interval() -> u64 {
        DEFAULT_POLL_INTERVAL_SECS
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PagesConfig {
    /// File served as the body of 500 responses
    pub error_page: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tls.keystore.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "tls.keystore must point to a PEM keystore".to_string(),
            ));
        }
        if self.http.port == 0 {
            return Err(ConfigError::Validation(
                "http.port must be non-zero".to_string(),
            ));
        }
        if self.watcher.poll_interval_seconds == 0 {
            return Err(ConfigError::Validation(
                "watcher.poll_interval_seconds must be non-zero".to_string(),
            ));
        }
        if let Some(redirect) = &self.http.redirect {
            if redirect.domain.is_empty() {
                return Err(ConfigError::Validation(
                    "http.redirect.domain must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

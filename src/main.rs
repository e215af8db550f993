//! hotcert: serve the default routes over HTTPS.
//!
//! This is the reference host for the library. It initializes tracing, loads
//! configuration from a TOML file, builds and starts the server, and stops it
//! on Ctrl+C or SIGTERM. SIGHUP forces a keystore reload.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotcert::config::{ServerConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use hotcert::http::shutdown::{shutdown_signal, spawn_reload_handler};
use hotcert::WebServerBuilder;

/// hotcert: an HTTPS server that reloads its certificate on change
#[derive(Parser, Debug)]
#[command(name = "hotcert", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "hotcert=debug")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Configuration first so the log format is known
    let config = ServerConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        config = %args.config,
        keystore = %config.tls.keystore.display(),
        host = %config.http.host,
        port = config.http.port,
        "Loaded configuration"
    );

    let server = WebServerBuilder::from_config(&config).build()?;
    server.start().await?;
    spawn_reload_handler(server.clone());

    shutdown_signal().await;
    server.stop().await;

    Ok(())
}

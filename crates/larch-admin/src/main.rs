//! Larch admin daemon
//!
//! Serves the admin JSON API with in-memory storage:
//! - Panels for every published content type
//! - Workflow definitions and bindings
//! - The translation assignment queue
//! - Dashboard, feature overrides, commands and metrics

use clap::Parser;
use larch_admin::{AdminConfig, DaemonError, DaemonResult, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Larch daemon CLI
#[derive(Parser)]
#[command(name = "larchd")]
#[command(about = "Larch admin daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LARCH_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "LARCH_LISTEN_ADDR")]
    listen: Option<String>,

    /// Mount point of the admin routes
    #[arg(long, env = "LARCH_BASE_PATH")]
    base_path: Option<String>,

    /// Log level
    #[arg(long, env = "LARCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "LARCH_LOG_JSON")]
    json: bool,

    /// Development mode: verbose error payloads and debug logging
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if cli.dev && cli.config.is_none() {
        AdminConfig::development()
    } else {
        AdminConfig::load(cli.config.as_deref()).map_err(|e| DaemonError::Config(e.to_string()))?
    };

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(base_path) = cli.base_path {
        config.base_path = base_path;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    if cli.dev {
        config.dev_mode = true;
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        title = %config.title,
        listen = %config.server.listen_addr,
        dev_mode = config.dev_mode,
        "Starting larchd"
    );

    let server = Server::new(config).await?;
    server.run().await
}

//! Service Health Monitor Binary

use actix_web::{App, HttpServer, web};
use clap::Parser;
use health_monitor::{Config, MonitoringManager, Result, api};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line overrides; each flag falls back to its environment variable
#[derive(Debug, Parser)]
#[command(name = "health_monitor", version, about = "Polls service health endpoints and raises alerts")]
struct Cli {
    /// Listen address of the read/ops API
    #[arg(long, env = "MONITOR_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Base URL for relative service URLs
    #[arg(long, env = "MONITOR_BASE_URL")]
    base_url: Option<String>,

    /// JSON file with the services to monitor
    #[arg(long, env = "MONITOR_SERVICES_FILE")]
    services_file: Option<PathBuf>,

    /// JSON file for durable health and alert state
    #[arg(long, env = "MONITOR_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Upper bound on a single persistence write, in milliseconds
    #[arg(long, env = "MONITOR_STORE_TIMEOUT_MS")]
    store_timeout_ms: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if self.services_file.is_some() {
            config.services_file = self.services_file;
        }
        if self.store_path.is_some() {
            config.store_path = self.store_path;
        }
        if let Some(ms) = self.store_timeout_ms {
            config.store_timeout = Duration::from_millis(ms);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing();

    info!("Starting Service Health Monitor v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env();
    cli.apply(&mut config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!(
        "Monitor configuration - Bind: {}, Base URL: {}, Store: {}",
        config.bind_addr,
        config.base_url,
        config
            .store_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "memory".to_string())
    );

    let manager = match MonitoringManager::from_config(&config).await {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            error!("Failed to initialize monitor: {}", e);
            std::process::exit(1);
        }
    };

    manager.start_monitoring().await;

    let data = web::Data::from(Arc::clone(&manager));
    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(api::configure))
        .bind(&config.bind_addr)?
        .run();

    info!("Health API listening on {}", config.bind_addr);

    // The server resolves once it has handled SIGINT/SIGTERM
    let served = server.await;

    manager.stop_monitoring().await;
    info!("Service Health Monitor stopped");

    served?;
    Ok(())
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

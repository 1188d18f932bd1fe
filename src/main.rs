//! Site Status Monitor Binary

use site_monitor::config::DEFAULT_CONFIG_PATH;
use site_monitor::{Config, Result, SiteMonitor};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    initialize_tracing();

    info!("Starting Site Status Monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_file(DEFAULT_CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", DEFAULT_CONFIG_PATH, e);
            std::process::exit(1);
        }
    };

    info!(
        "Monitor configuration - Sites: {}, Interval: {}ms, Listen: {}, Public dir: {}",
        config.sites.len(),
        config.check_interval_ms,
        config.listen_addr,
        config.public_dir
    );

    let monitor = SiteMonitor::new(config)?;

    if let Err(e) = monitor.start().await {
        error!("Monitor failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize structured logging
fn initialize_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

//! Wiring of prober, aggregator, scheduler, broadcaster and server

use crate::aggregator::Aggregator;
use crate::broadcaster::{Broadcaster, SubscriberRegistry};
use crate::config::Config;
use crate::errors::{MonitorError, Result};
use crate::prober::{HttpProber, Prober};
use crate::scheduler::{Scheduler, connection_channel};
use crate::server::{self, AppState};
use crate::status::Site;

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, instrument};

/// Site monitor owning every long-lived component
pub struct SiteMonitor {
    config: Config,
    aggregator: Arc<Aggregator>,
    broadcaster: Arc<Broadcaster>,
}

impl SiteMonitor {
    /// Create a monitor probing over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let prober = HttpProber::from_config(&config)?;
        Self::with_prober(config, Arc::new(prober))
    }

    /// Create a monitor with a custom prober
    pub fn with_prober(config: Config, prober: Arc<dyn Prober>) -> Result<Self> {
        config.validate().map_err(MonitorError::Config)?;

        let sites: Arc<[Site]> = config.sites.clone().into();
        let aggregator = Arc::new(Aggregator::new(sites, prober));
        let broadcaster = Arc::new(Broadcaster::new(Arc::new(SubscriberRegistry::new())));

        Ok(Self {
            config,
            aggregator,
            broadcaster,
        })
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Bind the configured address and run until Ctrl-C
    pub async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.socket_addr()?).await?;

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        };

        self.run(listener, shutdown).await
    }

    /// Run scheduler and server on `listener` until `shutdown` resolves
    #[instrument(skip_all)]
    pub async fn run<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        info!(
            "Monitoring {} sites every {}ms (timeout {}ms, {} retries)",
            self.config.sites.len(),
            self.config.check_interval_ms,
            self.config.probe_timeout_ms,
            self.config.max_retries
        );

        let (connections_tx, connections_rx) = connection_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scheduler = Scheduler::new(
            Arc::clone(&self.aggregator),
            Arc::clone(&self.broadcaster),
            self.config.check_interval(),
        );
        let scheduler_task = tokio::spawn(scheduler.run(connections_rx, shutdown_rx));

        let router = server::create_router(
            AppState {
                broadcaster: Arc::clone(&self.broadcaster),
                connections: connections_tx,
            },
            &self.config.public_dir,
        );

        let served = server::serve(listener, router, shutdown).await;

        // Stop scheduling once the server is down, whatever the reason.
        let _ = shutdown_tx.send(true);
        if let Err(e) = scheduler_task.await {
            error!("Scheduler task failed: {}", e);
        }

        self.shutdown();
        served
    }

    fn shutdown(&self) {
        let metrics = self.broadcaster.metrics();
        info!(
            "Final broadcast metrics - Broadcasts: {}, Delivered: {}, Dropped: {}",
            metrics.broadcasts, metrics.delivered, metrics.dropped
        );
        info!("Site monitor shutdown complete");
    }
}

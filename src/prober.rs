//! HTTP reachability probes with bounded retry

use crate::config::Config;
use crate::errors::{MonitorError, Result};
use crate::status::{ProbeResult, Site};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::error::Error as _;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Checks whether a single site is reachable.
///
/// Implementations must absorb every failure into a `down` result; a sweep
/// relies on probes never failing.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, site: &Site) -> ProbeResult;
}

/// Result of a probe together with the number of requests it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub result: ProbeResult,
    pub attempts: u32,
}

/// GET-based prober; only transport failures are retried
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl HttpProber {
    pub fn new(probe_timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(probe_timeout)
            .user_agent(format!("site_monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self {
            client,
            timeout: probe_timeout,
            max_retries,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.probe_timeout(), config.max_retries)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Probe a site, retrying transport failures up to `max_retries` times
    pub async fn probe_with_attempts(&self, site: &Site) -> ProbeOutcome {
        let url = site.url();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.probe_attempt(&url).await {
                Ok(result) => {
                    debug!(
                        "Probe of {} ({}) finished on attempt {}: {}",
                        site.name, url, attempt, result.status
                    );
                    return ProbeOutcome { result, attempts: attempt };
                }
                Err(message) => {
                    if attempt > self.max_retries {
                        warn!(
                            "Probe of {} ({}) failed after {} attempts: {}",
                            site.name, url, attempt, message
                        );
                        return ProbeOutcome {
                            result: ProbeResult::down(message),
                            attempts: attempt,
                        };
                    }

                    debug!(
                        "Probe of {} ({}) attempt {} failed, retrying: {}",
                        site.name, url, attempt, message
                    );
                }
            }
        }
    }

    /// Single request; `Err` carries a transport failure description
    async fn probe_attempt(&self, url: &str) -> std::result::Result<ProbeResult, String> {
        let response = timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| self.timeout_message())?
            .map_err(|e| self.describe_transport_error(&e))?;

        Ok(classify_status(response.status()))
    }

    fn timeout_message(&self) -> String {
        format!("timeout of {}ms exceeded", self.timeout.as_millis())
    }

    fn describe_transport_error(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            return self.timeout_message();
        }

        let mut root = err.source();
        while let Some(next) = root.and_then(|e| e.source()) {
            root = Some(next);
        }

        match root {
            Some(cause) => format!("{}: {}", err, cause),
            None => err.to_string(),
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, site: &Site) -> ProbeResult {
        self.probe_with_attempts(site).await.result
    }
}

/// Classify a completed HTTP response
pub fn classify_status(status: StatusCode) -> ProbeResult {
    if status.is_success() {
        return ProbeResult::up();
    }

    match status.canonical_reason() {
        Some(reason) => ProbeResult::down(format!("Error: {} {}", status.as_u16(), reason)),
        None => ProbeResult::down(format!("Error: {}", status.as_u16())),
    }
}

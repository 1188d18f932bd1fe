//! Configuration management for the site monitor

use crate::errors::{MonitorError, Result};
use crate::status::Site;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sites to probe, in display order
    #[serde(rename = "Sites")]
    pub sites: Vec<Site>,

    /// Delay between scheduled sweeps
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Per-request timeout for a single probe attempt
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Extra attempts after a transport failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Address the push/static server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory served as static assets
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
}

fn default_check_interval_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            check_interval_ms: default_check_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_retries: default_max_retries(),
            listen_addr: default_listen_addr(),
            public_dir: default_public_dir(),
        }
    }
}

impl Config {
    /// Load and validate the configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(contents)
            .map_err(|e| MonitorError::Config(format!("failed to parse config: {}", e)))?;
        config.validate().map_err(MonitorError::Config)?;
        Ok(config)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            MonitorError::Config(format!("invalid listen_addr {}: {}", self.listen_addr, e))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (index, site) in self.sites.iter().enumerate() {
            if site.name.trim().is_empty() {
                return Err(format!("site #{} has an empty name", index));
            }

            if site.domain.trim().is_empty() {
                return Err(format!("site {} has an empty domain", site.name));
            }

            if site.port == 0 {
                return Err(format!("site {} has port 0", site.name));
            }

            if site.protocol != "http" && site.protocol != "https" {
                return Err(format!(
                    "site {} has unsupported protocol {}",
                    site.name, site.protocol
                ));
            }
        }

        if self.check_interval_ms == 0 {
            return Err("check_interval_ms must be greater than 0".to_string());
        }

        if self.probe_timeout_ms == 0 {
            return Err("probe_timeout_ms must be greater than 0".to_string());
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr {} is not a socket address",
                self.listen_addr
            ));
        }

        Ok(())
    }
}

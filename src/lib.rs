//! Site Status Monitor Library
//!
//! This library periodically probes a configured list of sites over HTTP and
//! pushes their up/down status to connected browser clients.

pub mod config;
pub mod status;
pub mod prober;
pub mod aggregator;
pub mod broadcaster;
pub mod scheduler;
pub mod server;
pub mod monitor;
pub mod errors;

pub use config::Config;
pub use monitor::SiteMonitor;
pub use status::{ProbeResult, ProbeStatus, Site, SiteStatus, SweepReport};
pub use errors::{MonitorError, Result};

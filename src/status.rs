//! Site and status data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PROTOCOL: &str = "http";
pub const OPERATIONAL_DETAILS: &str = "Site is operational";
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// A monitored endpoint, loaded once from configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub name: String,
    pub domain: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

impl Site {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            port,
            protocol: default_protocol(),
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Request URL in the form `protocol://domain:port`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.domain, self.port)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Up => write!(f, "up"),
            ProbeStatus::Down => write!(f, "down"),
        }
    }
}

/// Classified outcome of probing one site
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub details: String,
}

impl ProbeResult {
    pub fn up() -> Self {
        Self {
            status: ProbeStatus::Up,
            details: OPERATIONAL_DETAILS.to_string(),
        }
    }

    pub fn down(details: impl Into<String>) -> Self {
        let details = details.into();
        Self {
            status: ProbeStatus::Down,
            details: if details.trim().is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                details
            },
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Up
    }
}

/// Status of a single site within one sweep; this is the wire shape of
/// both `statusUpdate` and `incidentUpdate` entries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteStatus {
    pub name: String,
    pub status: ProbeStatus,
    pub details: String,
}

impl SiteStatus {
    pub fn from_probe(site: &Site, result: ProbeResult) -> Self {
        Self {
            name: site.name.clone(),
            status: result.status,
            details: result.details,
        }
    }

    pub fn is_down(&self) -> bool {
        self.status == ProbeStatus::Down
    }
}

pub type StatusSnapshot = Vec<SiteStatus>;
pub type IncidentList = Vec<SiteStatus>;

/// Filter the down entries of a snapshot, keeping their relative order
pub fn incidents_of(snapshot: &[SiteStatus]) -> IncidentList {
    snapshot.iter().filter(|s| s.is_down()).cloned().collect()
}

/// What caused a sweep to run
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SweepTrigger {
    Startup,
    Interval,
    Connection,
}

impl fmt::Display for SweepTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepTrigger::Startup => write!(f, "startup"),
            SweepTrigger::Interval => write!(f, "interval"),
            SweepTrigger::Connection => write!(f, "connection"),
        }
    }
}

/// Everything one sweep produced
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep: u64,
    pub trigger: SweepTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub snapshot: StatusSnapshot,
    pub incidents: IncidentList,
}

impl SweepReport {
    pub fn up_count(&self) -> usize {
        self.snapshot.len() - self.incidents.len()
    }
}

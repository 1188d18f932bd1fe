//! Concurrent sweep over all configured sites

use crate::prober::Prober;
use crate::status::{
    IncidentList, Site, SiteStatus, StatusSnapshot, SweepReport, SweepTrigger, incidents_of,
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Runs one probe per site concurrently and joins the results in site order
pub struct Aggregator {
    sites: Arc<[Site]>,
    prober: Arc<dyn Prober>,
}

impl Aggregator {
    pub fn new(sites: Arc<[Site]>, prober: Arc<dyn Prober>) -> Self {
        Self { sites, prober }
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Probe every site and return the snapshot plus its incidents.
    ///
    /// Results are combined positionally, so the snapshot follows the
    /// configured order whatever order the probes complete in.
    pub async fn sweep(&self) -> (StatusSnapshot, IncidentList) {
        let probes = self.sites.iter().map(|site| {
            let prober = Arc::clone(&self.prober);
            async move { SiteStatus::from_probe(site, prober.probe(site).await) }
        });

        let snapshot: StatusSnapshot = join_all(probes).await;
        let incidents = incidents_of(&snapshot);

        debug!(
            "Sweep probed {} sites, {} down",
            snapshot.len(),
            incidents.len()
        );

        (snapshot, incidents)
    }

    /// Run a sweep and stamp it with its sequence number and timing
    #[instrument(skip(self))]
    pub async fn run_sweep(&self, sweep: u64, trigger: SweepTrigger) -> SweepReport {
        let started_at = Utc::now();
        let (snapshot, incidents) = self.sweep().await;

        SweepReport {
            sweep,
            trigger,
            started_at,
            finished_at: Utc::now(),
            snapshot,
            incidents,
        }
    }
}

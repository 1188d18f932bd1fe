//! Sweep scheduling: startup, fixed interval, and new connections

use crate::aggregator::Aggregator;
use crate::broadcaster::{BroadcastSummary, Broadcaster};
use crate::status::SweepTrigger;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument};

/// Raised by the transport when a subscriber connects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub subscriber_id: String,
}

pub type ConnectionSender = mpsc::UnboundedSender<ConnectionEvent>;
pub type ConnectionReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

pub fn connection_channel() -> (ConnectionSender, ConnectionReceiver) {
    mpsc::unbounded_channel()
}

/// Drives sweeps and hands their reports to the broadcaster.
///
/// Every trigger spawns an independent sweep task. Sweeps are neither
/// coalesced nor cancelled, so they may overlap; each carries its own
/// sequence number.
pub struct Scheduler {
    aggregator: Arc<Aggregator>,
    broadcaster: Arc<Broadcaster>,
    interval: Duration,
    sequence: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(
        aggregator: Arc<Aggregator>,
        broadcaster: Arc<Broadcaster>,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            broadcaster,
            interval,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start one sweep in the background
    pub fn trigger(&self, trigger: SweepTrigger) -> JoinHandle<BroadcastSummary> {
        let sweep = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let aggregator = Arc::clone(&self.aggregator);
        let broadcaster = Arc::clone(&self.broadcaster);

        debug!("Starting sweep {} ({})", sweep, trigger);

        tokio::spawn(async move {
            let report = aggregator.run_sweep(sweep, trigger).await;
            let elapsed_ms = (report.finished_at - report.started_at).num_milliseconds();
            let (up, down) = (report.up_count(), report.incidents.len());

            let summary = broadcaster.broadcast(report).await;

            info!(
                "Sweep {} ({}) finished in {}ms: {} up, {} down, \
                 delivered to {} subscribers ({} dropped)",
                sweep, trigger, elapsed_ms, up, down, summary.subscribers, summary.dropped
            );

            summary
        })
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    ///
    /// The first interval tick fires immediately and is the startup sweep.
    #[instrument(skip_all, fields(interval_ms = self.interval.as_millis() as u64))]
    pub async fn run(
        self,
        mut connections: ConnectionReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Scheduler started, sweeping every {}ms", self.interval.as_millis());

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_trigger = SweepTrigger::Startup;
        let mut connections_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.trigger(next_trigger);
                    next_trigger = SweepTrigger::Interval;
                }
                event = connections.recv(), if connections_open => match event {
                    Some(event) => {
                        debug!("Subscriber {} connected, sweeping now", event.subscriber_id);
                        self.trigger(SweepTrigger::Connection);
                    }
                    None => {
                        debug!("Connection channel closed");
                        connections_open = false;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            "Scheduler stopped after {} sweeps",
            self.sequence.load(Ordering::Relaxed)
        );
    }

    pub fn sweeps_started(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

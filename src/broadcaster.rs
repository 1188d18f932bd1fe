//! Fan-out of sweep results to connected subscribers

use crate::errors::{MonitorError, Result};
use crate::status::{SiteStatus, SweepReport};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};
use uuid::Uuid;

pub const STATUS_UPDATE: &str = "statusUpdate";
pub const INCIDENT_UPDATE: &str = "incidentUpdate";

/// Per-subscriber outbound queue depth
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 16;

/// Body of a pushed event
#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub sweep: u64,
    pub data: Vec<SiteStatus>,
}

/// A connected client that receives pushed events.
///
/// `send` must return without waiting on the client.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> &str;
    fn send(&self, event: &str, payload: &EventPayload) -> Result<()>;

    fn is_closed(&self) -> bool {
        false
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    event: &'a str,
    sweep: u64,
    data: &'a [SiteStatus],
}

/// Subscriber backed by a bounded channel; the transport drains the
/// receiving end into the client connection.
#[derive(Debug)]
pub struct ChannelSubscriber {
    id: String,
    tx: mpsc::Sender<String>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let subscriber = Self {
            id: Uuid::new_v4().to_string(),
            tx,
        };
        (subscriber, rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, event: &str, payload: &EventPayload) -> Result<()> {
        let frame = serde_json::to_string(&WireMessage {
            event,
            sweep: payload.sweep,
            data: &payload.data,
        })?;

        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => {
                MonitorError::Subscriber(format!("queue full for subscriber {}", self.id))
            }
            TrySendError::Closed(_) => {
                MonitorError::Subscriber(format!("subscriber {} disconnected", self.id))
            }
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Set of currently connected subscribers
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, subscriber: Arc<dyn Subscriber>) {
        let mut subscribers = self.subscribers.write().await;
        debug!("Registered subscriber {}", subscriber.id());
        subscribers.push(subscriber);
    }

    /// Returns true if a subscriber with this id was removed
    pub async fn unregister(&self, id: &str) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| s.id() != id);
        let removed = subscribers.len() != before;
        if removed {
            debug!("Unregistered subscriber {}", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Copy of the current subscriber list, so delivery never holds the lock
    pub async fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        self.subscribers.read().await.clone()
    }

    /// Drop subscribers whose connection is gone; returns how many
    pub async fn prune_closed(&self) -> usize {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| !s.is_closed());
        before - subscribers.len()
    }
}

/// Delivery counts for one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub subscribers: usize,
    pub delivered: u64,
    pub dropped: u64,
}

/// Snapshot of cumulative delivery metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastMetricsSnapshot {
    pub broadcasts: u64,
    pub delivered: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct BroadcastMetrics {
    broadcasts: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastMetrics {
    fn record(&self, summary: &BroadcastSummary) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(summary.delivered, Ordering::Relaxed);
        self.dropped.fetch_add(summary.dropped, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BroadcastMetricsSnapshot {
        BroadcastMetricsSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Pushes sweep reports to every registered subscriber
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    latest: RwLock<Option<Arc<SweepReport>>>,
    metrics: BroadcastMetrics,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            registry,
            latest: RwLock::new(None),
            metrics: BroadcastMetrics::default(),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Emit `statusUpdate` and `incidentUpdate` to all subscribers.
    ///
    /// Failed deliveries are counted and skipped; closed subscribers are
    /// pruned afterwards.
    pub async fn broadcast(&self, report: SweepReport) -> BroadcastSummary {
        let status = EventPayload {
            sweep: report.sweep,
            data: report.snapshot.clone(),
        };
        let incidents = EventPayload {
            sweep: report.sweep,
            data: report.incidents.clone(),
        };

        let subscribers = self.registry.snapshot().await;
        let mut summary = BroadcastSummary {
            subscribers: subscribers.len(),
            ..Default::default()
        };

        for subscriber in &subscribers {
            for (event, payload) in [(STATUS_UPDATE, &status), (INCIDENT_UPDATE, &incidents)] {
                match subscriber.send(event, payload) {
                    Ok(()) => summary.delivered += 1,
                    Err(e) => {
                        summary.dropped += 1;
                        debug!("Dropped {} for sweep {}: {}", event, report.sweep, e);
                    }
                }
            }
        }

        let pruned = self.registry.prune_closed().await;
        if pruned > 0 {
            debug!("Pruned {} disconnected subscribers", pruned);
        }

        self.metrics.record(&summary);
        self.store_latest(report).await;

        summary
    }

    /// Keep the report if it is newer than the cached one
    async fn store_latest(&self, report: SweepReport) {
        let mut latest = self.latest.write().await;
        match latest.as_ref() {
            Some(current) if current.sweep > report.sweep => {
                info!(
                    "Sweep {} finished after sweep {}, not caching it",
                    report.sweep, current.sweep
                );
            }
            _ => *latest = Some(Arc::new(report)),
        }
    }

    /// Most recent sweep report, if any sweep has finished
    pub async fn latest(&self) -> Option<Arc<SweepReport>> {
        self.latest.read().await.clone()
    }

    pub fn metrics(&self) -> BroadcastMetricsSnapshot {
        self.metrics.snapshot()
    }
}

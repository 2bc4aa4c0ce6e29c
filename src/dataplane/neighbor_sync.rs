//! Neighbor sync
//!
//! Control-plane consumer of the event channel. Each decoded binding is
//! written into the neighbor table as reachable and forwarded to the daemon so
//! packets parked on that next hop can be released.

use super::events::{EventReceiver, NeighborBinding, BINDING_RECORD_LEN};
use super::neighbor_table::NeighborTable;
use crate::telemetry::MetricsRegistry;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct NeighborSync {
    neighbors: Arc<RwLock<NeighborTable>>,
    metrics: Arc<MetricsRegistry>,
}

impl NeighborSync {
    pub fn new(neighbors: Arc<RwLock<NeighborTable>>) -> Self {
        Self {
            neighbors,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Counts bindings the daemon queue had no room for in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Applies one raw record. Malformed records are logged and skipped.
    pub fn apply(&self, record: &[u8]) -> Option<NeighborBinding> {
        if record.len() < BINDING_RECORD_LEN {
            warn!(len = record.len(), "short neighbor event record");
            return None;
        }
        let Some(binding) = NeighborBinding::decode(record) else {
            warn!(family = record[4], "neighbor event with unknown family");
            return None;
        };

        info!(
            ifindex = binding.ifindex,
            family = binding.family.as_u8(),
            ip = %binding.ip_addr(),
            mac = %binding.mac,
            "neighbor learned"
        );

        let changed = self
            .neighbors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(binding.ifindex, binding.ip_addr(), binding.mac);
        if changed {
            debug!(ifindex = binding.ifindex, ip = %binding.ip_addr(), "neighbor entry updated");
        }

        Some(binding)
    }

    /// Drains `events` until every producer is gone.
    ///
    /// Never waits on `learned`: when the daemon is behind, the binding is
    /// still in the neighbor table and only the release of its parked packets
    /// is skipped (they age out).
    pub async fn run(
        self,
        mut events: EventReceiver,
        learned: mpsc::Sender<NeighborBinding>,
    ) {
        while let Some(record) = events.recv().await {
            let Some(binding) = self.apply(&record) else {
                continue;
            };
            match learned.try_send(binding) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(binding)) => {
                    self.metrics.learned_dropped.inc();
                    debug!(ifindex = binding.ifindex, ip = %binding.ip_addr(), "daemon queue full, release skipped");
                }
                // Receiver gone means the daemon is shutting down
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        debug!("neighbor event channel closed");
    }
}

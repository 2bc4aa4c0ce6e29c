//! Metrics collection for packet statistics.
//!
//! Thread-safe counters for the daemon side: per-interface socket traffic,
//! neighbor resolution and table sizes. Hook outcome counters live in
//! `dataplane::stats`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Packet socket traffic of one attached interface.
#[derive(Debug, Default)]
pub struct InterfaceStats {
    pub rx_packets: Counter,
    pub rx_bytes: Counter,
    pub tx_packets: Counter,
    pub tx_bytes: Counter,
    /// Frames this host transmitted, looped back to the socket and skipped
    pub rx_outgoing: Counter,
    pub rx_errors: Counter,
    pub tx_errors: Counter,
}

impl InterfaceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rx(&self, bytes: usize) {
        self.rx_packets.inc();
        self.rx_bytes.add(bytes as u64);
    }

    pub fn record_tx(&self, bytes: usize) {
        self.tx_packets.inc();
        self.tx_bytes.add(bytes as u64);
    }

    pub fn record_rx_error(&self) {
        self.rx_errors.inc();
    }

    pub fn record_tx_error(&self) {
        self.tx_errors.inc();
    }

    pub fn record_outgoing(&self) {
        self.rx_outgoing.inc();
    }
}

/// Global metrics registry for the daemon.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Per-interface statistics.
    interfaces: RwLock<HashMap<String, InterfaceStats>>,

    // Neighbor metrics
    /// Number of bindings applied from the event channel.
    pub neighbors_learned: Counter,
    /// Number of ARP requests and Neighbor Solicitations sent.
    pub solicitations_sent: Counter,
    /// Learned bindings not handed to the daemon because its queue was full.
    pub learned_dropped: Counter,

    // Redirect metrics
    /// Number of rewritten frames handed to an egress socket.
    pub packets_redirected: Counter,
    /// Number of packets released after their next hop was resolved.
    pub pending_released: Counter,
    /// Number of packets discarded by a full pending queue.
    pub pending_dropped: Counter,
    /// Number of packets aged out of the pending queue.
    pub pending_expired: Counter,

    // Gauges (using AtomicU64)
    /// Events discarded because the channel was full.
    pub events_dropped: AtomicU64,
    /// Current number of neighbor table entries.
    pub neighbor_table_size: AtomicU64,
    /// Current number of routing table entries.
    pub route_count: AtomicU64,
    /// Current number of interface remap entries.
    pub remap_entries: AtomicU64,
}

impl MetricsRegistry {
    /// Creates a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an interface for statistics tracking.
    pub fn register_interface(&self, name: &str) {
        let mut interfaces = self.interfaces.write().unwrap_or_else(|e| e.into_inner());
        interfaces.entry(name.to_string()).or_default();
    }

    /// Stops tracking an interface.
    pub fn unregister_interface(&self, name: &str) {
        self.interfaces
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }

    fn with_interface(&self, interface: &str, f: impl FnOnce(&InterfaceStats)) {
        let interfaces = self.interfaces.read().unwrap_or_else(|e| e.into_inner());
        if let Some(stats) = interfaces.get(interface) {
            f(stats);
        }
    }

    /// Records a received packet on an interface.
    pub fn record_rx(&self, interface: &str, bytes: usize) {
        self.with_interface(interface, |stats| stats.record_rx(bytes));
    }

    /// Records a transmitted packet on an interface.
    pub fn record_tx(&self, interface: &str, bytes: usize) {
        self.with_interface(interface, |stats| stats.record_tx(bytes));
    }

    /// Records a receive error on an interface.
    pub fn record_rx_error(&self, interface: &str) {
        self.with_interface(interface, |stats| stats.record_rx_error());
    }

    /// Records a transmit error on an interface.
    pub fn record_tx_error(&self, interface: &str) {
        self.with_interface(interface, |stats| stats.record_tx_error());
    }

    /// Records a looped-back frame of our own that was not processed.
    pub fn record_outgoing(&self, interface: &str) {
        self.with_interface(interface, |stats| stats.record_outgoing());
    }

    pub fn set_events_dropped(&self, count: u64) {
        self.events_dropped.store(count, Ordering::Relaxed);
    }

    /// Updates the neighbor table size gauge.
    pub fn set_neighbor_table_size(&self, size: usize) {
        self.neighbor_table_size.store(size as u64, Ordering::Relaxed);
    }

    /// Updates the route count gauge.
    pub fn set_route_count(&self, count: usize) {
        self.route_count.store(count as u64, Ordering::Relaxed);
    }

    pub fn set_remap_entries(&self, count: usize) {
        self.remap_entries.store(count as u64, Ordering::Relaxed);
    }

    /// Exports all metrics as key-value pairs.
    ///
    /// Interfaces are listed in name order.
    pub fn export(&self) -> Vec<(String, u64)> {
        // Global counters and gauges
        let mut result = vec![
            ("neighbors_learned".into(), self.neighbors_learned.get()),
            ("solicitations_sent".into(), self.solicitations_sent.get()),
            ("learned_dropped".into(), self.learned_dropped.get()),
            ("packets_redirected".into(), self.packets_redirected.get()),
            ("pending_released".into(), self.pending_released.get()),
            ("pending_dropped".into(), self.pending_dropped.get()),
            ("pending_expired".into(), self.pending_expired.get()),
            (
                "events_dropped".into(),
                self.events_dropped.load(Ordering::Relaxed),
            ),
            (
                "neighbor_table_size".into(),
                self.neighbor_table_size.load(Ordering::Relaxed),
            ),
            (
                "route_count".into(),
                self.route_count.load(Ordering::Relaxed),
            ),
            (
                "remap_entries".into(),
                self.remap_entries.load(Ordering::Relaxed),
            ),
        ];

        // Per-interface metrics
        let interfaces = self.interfaces.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<&String> = interfaces.keys().collect();
        names.sort();
        for name in names {
            let stats = &interfaces[name];
            result.extend([
                (format!("{}_rx_packets", name), stats.rx_packets.get()),
                (format!("{}_rx_bytes", name), stats.rx_bytes.get()),
                (format!("{}_tx_packets", name), stats.tx_packets.get()),
                (format!("{}_tx_bytes", name), stats.tx_bytes.get()),
                (format!("{}_rx_outgoing", name), stats.rx_outgoing.get()),
                (format!("{}_rx_errors", name), stats.rx_errors.get()),
                (format!("{}_tx_errors", name), stats.tx_errors.get()),
            ]);
        }

        result
    }
}

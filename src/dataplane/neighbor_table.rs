//! Neighbor table (IP to MAC mapping per interface)
//!
//! Bindings learned from snooped ARP and Neighbor Advertisements land here,
//! alongside permanent entries from configuration. The static FIB consults it
//! to decide between `success` and `no_neigh`.

use crate::protocol::MacAddr;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Neighbor entry state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborState {
    /// Recently confirmed reachability
    Reachable,
    /// Reachability is unknown, will be re-probed
    Stale,
    /// Configured; never ages
    Permanent,
}

#[derive(Debug, Clone)]
struct NeighborEntry {
    mac: MacAddr,
    state: NeighborState,
    last_updated: Instant,
}

/// Neighbor table keyed by (ifindex, address)
#[derive(Debug)]
pub struct NeighborTable {
    entries: HashMap<(u32, IpAddr), NeighborEntry>,
    reachable_time: Duration,
    stale_time: Duration,
}

impl NeighborTable {
    pub fn new(reachable_time: Duration, stale_time: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            reachable_time,
            stale_time,
        }
    }

    /// Insert or refresh a learned entry. Permanent entries are left alone.
    ///
    /// Returns true if the entry is new or its MAC changed.
    pub fn insert(&mut self, ifindex: u32, ip: IpAddr, mac: MacAddr) -> bool {
        let now = Instant::now();
        match self.entries.get_mut(&(ifindex, ip)) {
            Some(entry) if entry.state == NeighborState::Permanent => false,
            Some(entry) => {
                let changed = entry.mac != mac;
                entry.mac = mac;
                entry.state = NeighborState::Reachable;
                entry.last_updated = now;
                changed
            }
            None => {
                self.entries.insert(
                    (ifindex, ip),
                    NeighborEntry {
                        mac,
                        state: NeighborState::Reachable,
                        last_updated: now,
                    },
                );
                true
            }
        }
    }

    /// Insert a configured entry that never ages out
    pub fn insert_permanent(&mut self, ifindex: u32, ip: IpAddr, mac: MacAddr) {
        self.entries.insert(
            (ifindex, ip),
            NeighborEntry {
                mac,
                state: NeighborState::Permanent,
                last_updated: Instant::now(),
            },
        );
    }

    /// Lookup MAC address for an address on an interface
    pub fn lookup(&self, ifindex: u32, ip: &IpAddr) -> Option<(MacAddr, NeighborState)> {
        self.entries
            .get(&(ifindex, *ip))
            .map(|e| (e.mac, e.state))
    }

    /// Update entry states based on time
    pub fn refresh_states(&mut self) {
        let now = Instant::now();
        for entry in self.entries.values_mut() {
            let age = now.duration_since(entry.last_updated);
            if entry.state == NeighborState::Reachable && age >= self.reachable_time {
                entry.state = NeighborState::Stale;
            }
        }

        // Remove very old learned entries
        let stale_time = self.stale_time;
        self.entries.retain(|_, e| {
            e.state == NeighborState::Permanent || now.duration_since(e.last_updated) < stale_time
        });
    }

    /// Get all entries that need neighbor refresh
    pub fn get_stale_entries(&self) -> Vec<(u32, IpAddr)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.state == NeighborState::Stale)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Drops entries on interfaces that fail `keep`
    pub fn retain_interfaces(&mut self, mut keep: impl FnMut(u32) -> bool) {
        self.entries.retain(|(ifindex, _), _| keep(*ifindex));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove an entry
    pub fn remove(&mut self, ifindex: u32, ip: &IpAddr) -> Option<MacAddr> {
        self.entries.remove(&(ifindex, *ip)).map(|e| e.mac)
    }
}

impl Default for NeighborTable {
    fn default() -> Self {
        // Default: 30 seconds reachable, 5 minutes stale timeout
        Self::new(Duration::from_secs(30), Duration::from_secs(300))
    }
}

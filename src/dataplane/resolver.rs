//! Neighbor resolver
//!
//! Handles packets the forwarding engine could not finish because the next
//! hop's link-layer address is unknown. Packets are parked per next hop and a
//! single ARP request or Neighbor Solicitation goes out the egress interface.
//! When the binding is learned, the parked packets get their Ethernet
//! addresses filled in and are released.

use super::hook::NextHop;
use crate::protocol::arp::ArpPacket;
use crate::protocol::ethernet::FrameBuilder;
use crate::protocol::icmpv6::{multicast_mac, set_checksum, solicited_node_multicast};
use crate::protocol::icmpv6::NeighborSolicitation;
use crate::protocol::ipv6::Ipv6Builder;
use crate::protocol::types::{link_local_from_mac, EtherType};
use crate::protocol::MacAddr;
use fibhook_packet::eth::ETH_HLEN;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A packet waiting for neighbor resolution
#[derive(Debug, Clone)]
struct PendingPacket {
    data: Vec<u8>,
    queued_at: Instant,
}

/// Packets waiting for a next hop, keyed by (egress ifindex, next hop)
#[derive(Debug)]
pub struct PendingQueue {
    pending: HashMap<(u32, IpAddr), Vec<PendingPacket>>,
    /// Maximum packets to queue per next hop
    max_per_neighbor: usize,
    max_age: Duration,
}

impl PendingQueue {
    pub fn new(max_per_neighbor: usize, max_age: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            max_per_neighbor,
            max_age,
        }
    }

    /// Queue a packet waiting for resolution
    ///
    /// Returns false if the queue for this next hop is full
    pub fn enqueue(&mut self, ifindex: u32, nexthop: IpAddr, data: Vec<u8>) -> bool {
        let queue = self.pending.entry((ifindex, nexthop)).or_default();

        if queue.len() >= self.max_per_neighbor {
            return false;
        }

        queue.push(PendingPacket {
            data,
            queued_at: Instant::now(),
        });
        true
    }

    /// Dequeue all packets for a resolved next hop, oldest first
    pub fn dequeue(&mut self, ifindex: u32, nexthop: &IpAddr) -> Vec<Vec<u8>> {
        self.pending
            .remove(&(ifindex, *nexthop))
            .map(|packets| packets.into_iter().map(|p| p.data).collect())
            .unwrap_or_default()
    }

    pub fn pending_count(&self, ifindex: u32, nexthop: &IpAddr) -> usize {
        self.pending
            .get(&(ifindex, *nexthop))
            .map_or(0, |v| v.len())
    }

    /// Remove expired packets, returning how many were discarded
    pub fn expire_old(&mut self) -> usize {
        let now = Instant::now();
        let max_age = self.max_age;
        let mut expired = 0;

        for queue in self.pending.values_mut() {
            let before = queue.len();
            queue.retain(|p| now.duration_since(p.queued_at) < max_age);
            expired += before - queue.len();
        }

        // Remove empty entries
        self.pending.retain(|_, v| !v.is_empty());
        expired
    }

    /// Remove expired packets waiting for one next hop
    pub fn expire_for(&mut self, ifindex: u32, nexthop: &IpAddr) -> usize {
        let key = (ifindex, *nexthop);
        let max_age = self.max_age;
        let Some(queue) = self.pending.get_mut(&key) else {
            return 0;
        };

        let now = Instant::now();
        let before = queue.len();
        queue.retain(|p| now.duration_since(p.queued_at) < max_age);
        let expired = before - queue.len();

        if queue.is_empty() {
            self.pending.remove(&key);
        }
        expired
    }

    /// Drops every queue whose egress interface fails `keep`
    pub fn retain_interfaces(&mut self, mut keep: impl FnMut(u32) -> bool) {
        self.pending.retain(|(ifindex, _), _| keep(*ifindex));
    }

    /// Number of next hops with pending packets
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Link-layer and network addresses used as the source of solicitations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddrs {
    pub ifindex: u32,
    pub mac: MacAddr,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

/// Result of handing a packet to the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolve {
    /// First packet for this next hop; transmit the solicitation on the
    /// egress interface.
    Solicit(Vec<u8>),
    /// Queued behind an outstanding solicitation
    Queued,
    /// Queue for this next hop is full; the packet was discarded
    QueueFull,
}

/// Pending queue plus solicitation builder.
#[derive(Debug)]
pub struct NeighborResolver {
    queue: Mutex<PendingQueue>,
    /// Aged out on resolve or release, not yet reported by `expire`
    expired: AtomicUsize,
}

impl NeighborResolver {
    pub fn new(max_per_neighbor: usize, max_age: Duration) -> Self {
        Self {
            queue: Mutex::new(PendingQueue::new(max_per_neighbor, max_age)),
            expired: AtomicUsize::new(0),
        }
    }

    /// Parks `frame` until `nexthop` is resolved on `egress`.
    ///
    /// A queue whose packets all aged out counts as absent, so the next
    /// packet for that next hop solicits again.
    pub fn resolve(&self, egress: &InterfaceAddrs, nexthop: NextHop, frame: &[u8]) -> Resolve {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let expired = queue.expire_for(egress.ifindex, &nexthop.addr);
        self.expired.fetch_add(expired, Ordering::Relaxed);
        let first = queue.pending_count(egress.ifindex, &nexthop.addr) == 0;

        if !queue.enqueue(egress.ifindex, nexthop.addr, frame.to_vec()) {
            return Resolve::QueueFull;
        }
        if first {
            Resolve::Solicit(Self::solicitation(egress, nexthop.addr))
        } else {
            Resolve::Queued
        }
    }

    /// Releases packets parked for `nexthop` on `ifindex`, rewritten with the
    /// learned destination and the egress source address. Packets older than
    /// the maximum age are discarded instead.
    pub fn release(&self, ifindex: u32, nexthop: &IpAddr, dmac: MacAddr, smac: MacAddr) -> Vec<Vec<u8>> {
        let packets = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            let expired = queue.expire_for(ifindex, nexthop);
            self.expired.fetch_add(expired, Ordering::Relaxed);
            queue.dequeue(ifindex, nexthop)
        };

        packets
            .into_iter()
            .filter(|p| p.len() >= ETH_HLEN)
            .map(|mut p| {
                p[0..6].copy_from_slice(&dmac.0);
                p[6..12].copy_from_slice(&smac.0);
                p
            })
            .collect()
    }

    /// Discards packets that waited too long. Returns how many were dropped,
    /// including those aged out by `resolve` and `release` since the last
    /// call.
    pub fn expire(&self) -> usize {
        let swept = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .expire_old();
        swept + self.expired.swap(0, Ordering::Relaxed)
    }

    pub fn forget_interfaces(&self, keep: impl FnMut(u32) -> bool) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain_interfaces(keep);
    }

    /// Number of next hops with packets waiting
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Builds an ARP request or Neighbor Solicitation for `target`.
    pub fn solicitation(src: &InterfaceAddrs, target: IpAddr) -> Vec<u8> {
        match target {
            IpAddr::V4(target) => {
                let sender_ip = src.ipv4.unwrap_or(Ipv4Addr::UNSPECIFIED);
                let arp = ArpPacket::request(src.mac, sender_ip, target);
                FrameBuilder::new()
                    .dst_mac(MacAddr::BROADCAST)
                    .src_mac(src.mac)
                    .ethertype(EtherType::Arp as u16)
                    .payload(&arp.to_bytes())
                    .build()
            }
            IpAddr::V6(target) => {
                let src_ip = src.ipv6.unwrap_or_else(|| link_local_from_mac(&src.mac));
                let group = solicited_node_multicast(&target);

                let mut ns = NeighborSolicitation::new(target, Some(src.mac)).to_bytes();
                set_checksum(&mut ns, &src_ip, &group);

                let packet = Ipv6Builder::new()
                    .next_header(58)
                    .hop_limit(255)
                    .src_addr(src_ip)
                    .dst_addr(group)
                    .payload(&ns)
                    .build();

                FrameBuilder::new()
                    .dst_mac(multicast_mac(&group))
                    .src_mac(src.mac)
                    .ethertype(EtherType::Ipv6 as u16)
                    .payload(&packet)
                    .build()
            }
        }
    }
}

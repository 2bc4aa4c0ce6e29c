//! Neighbor binding events
//!
//! Fixed 27-byte records carried from the snooper to the control plane over
//! a bounded channel. Producers reserve a slot before writing, so a record is
//! either delivered whole or not at all; when the channel is full the record
//! is dropped and counted.

use super::fib::AddressFamily;
use crate::protocol::MacAddr;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

// Record layout
// 4 OCTETS INTERFACE INDEX (little endian)
// 1 OCTET  FAMILY (4 | 6)
// 6 OCTETS LINK-LAYER ADDRESS
// 16 OCTETS NETWORK ADDRESS (IPv4 in the first 4, rest zero)
pub const BINDING_RECORD_LEN: usize = 27;

/// Default channel depth in records.
pub const DEFAULT_EVENT_CAPACITY: usize = 65536;

pub type BindingRecord = [u8; BINDING_RECORD_LEN];

/// One observed IP to MAC binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborBinding {
    pub ifindex: u32,
    pub family: AddressFamily,
    pub mac: MacAddr,
    pub ip: [u8; 16],
}

impl NeighborBinding {
    pub fn ipv4(ifindex: u32, mac: MacAddr, addr: [u8; 4]) -> Self {
        let mut ip = [0u8; 16];
        ip[..4].copy_from_slice(&addr);
        Self {
            ifindex,
            family: AddressFamily::Ipv4,
            mac,
            ip,
        }
    }

    pub fn ipv6(ifindex: u32, mac: MacAddr, addr: [u8; 16]) -> Self {
        Self {
            ifindex,
            family: AddressFamily::Ipv6,
            mac,
            ip: addr,
        }
    }

    pub fn ip_addr(&self) -> IpAddr {
        match self.family {
            AddressFamily::Ipv4 => {
                IpAddr::V4(Ipv4Addr::new(self.ip[0], self.ip[1], self.ip[2], self.ip[3]))
            }
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::from(self.ip)),
        }
    }

    pub fn encode(&self) -> BindingRecord {
        let mut rec = [0u8; BINDING_RECORD_LEN];
        rec[0..4].copy_from_slice(&self.ifindex.to_le_bytes());
        rec[4] = self.family.as_u8();
        rec[5..11].copy_from_slice(&self.mac.0);
        rec[11..27].copy_from_slice(&self.ip);
        rec
    }

    /// Decodes a record. Short records and unknown families yield `None`;
    /// trailing bytes are ignored.
    pub fn decode(record: &[u8]) -> Option<Self> {
        let rec = record.get(..BINDING_RECORD_LEN)?;
        let family = AddressFamily::from_u8(rec[4])?;
        let mut ifindex = [0u8; 4];
        let mut mac = [0u8; 6];
        let mut ip = [0u8; 16];
        ifindex.copy_from_slice(&rec[0..4]);
        mac.copy_from_slice(&rec[5..11]);
        ip.copy_from_slice(&rec[11..27]);
        Some(Self {
            ifindex: u32::from_le_bytes(ifindex),
            family,
            mac: MacAddr(mac),
            ip,
        })
    }
}

/// Creates a bounded event channel holding `capacity` records.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        EventReceiver { rx },
    )
}

/// Producer half. Cheap to clone; one per packet worker.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<BindingRecord>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Publishes a binding without waiting. Returns false if the channel was
    /// full or closed and the event was discarded.
    pub fn emit(&self, binding: &NeighborBinding) -> bool {
        match self.tx.try_reserve() {
            Ok(permit) => {
                permit.send(binding.encode());
                true
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Events discarded so far across all clones.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<BindingRecord>,
}

impl EventReceiver {
    /// Waits for the next record; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<BindingRecord> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BindingRecord> {
        self.rx.try_recv().ok()
    }
}

//! FIB lookup collaborator
//!
//! The forwarding engine never walks a routing table itself. It builds a
//! [`FibQuery`] per packet and hands it to a [`FibLookup`] implementation,
//! which answers with one of the kernel's `BPF_FIB_LKUP_RET_*` result codes.

use crate::protocol::MacAddr;
use std::net::IpAddr;
use std::sync::Arc;

/// Address family of a query or a learned binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Wire value used in neighbor events (4 or 6).
    pub fn as_u8(self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 4,
            AddressFamily::Ipv6 => 6,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            4 => Some(AddressFamily::Ipv4),
            6 => Some(AddressFamily::Ipv6),
            _ => None,
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

/// Result codes of a FIB lookup, in kernel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FibCode {
    Success = 0,
    Blackhole = 1,
    Unreachable = 2,
    Prohibit = 3,
    NotForwarded = 4,
    ForwardingDisabled = 5,
    UnsupportedLwt = 6,
    NoNeighbor = 7,
    FragmentationNeeded = 8,
}

impl FibCode {
    pub const COUNT: usize = 9;

    pub const ALL: [FibCode; FibCode::COUNT] = [
        FibCode::Success,
        FibCode::Blackhole,
        FibCode::Unreachable,
        FibCode::Prohibit,
        FibCode::NotForwarded,
        FibCode::ForwardingDisabled,
        FibCode::UnsupportedLwt,
        FibCode::NoNeighbor,
        FibCode::FragmentationNeeded,
    ];

    pub fn from_i32(value: i32) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| FibCode::ALL.get(idx).copied())
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Export name. The spelling of `unreacheable` matches existing dashboards.
    pub fn name(self) -> &'static str {
        match self {
            FibCode::Success => "success",
            FibCode::Blackhole => "blackhole",
            FibCode::Unreachable => "unreacheable",
            FibCode::Prohibit => "prohibit",
            FibCode::NotForwarded => "not_fwded",
            FibCode::ForwardingDisabled => "fwd_disabled",
            FibCode::UnsupportedLwt => "unsupp_lwt",
            FibCode::NoNeighbor => "no_neigh",
            FibCode::FragmentationNeeded => "frag_needed",
        }
    }
}

/// Per-packet lookup request. Ports and length are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibQuery {
    pub family: AddressFamily,
    /// IPv4 type of service; zero for IPv6.
    pub tos: u8,
    /// IPv6 traffic class and flow label; zero for IPv4.
    pub flowinfo: u32,
    pub l4_protocol: u8,
    pub sport: u16,
    pub dport: u16,
    pub tot_len: u16,
    pub src: IpAddr,
    pub dst: IpAddr,
    /// Ingress interface after remapping.
    pub ifindex: u32,
}

/// Answer from a [`FibLookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FibResult {
    /// Route and neighbor resolved.
    Success {
        ifindex: u32,
        smac: MacAddr,
        dmac: MacAddr,
    },
    /// Route resolved but the next hop has no usable link-layer address.
    NoNeighbor { ifindex: u32, nexthop: IpAddr },
    /// Any other code, including negative errors.
    Other(i32),
}

impl FibResult {
    pub fn code(&self) -> i32 {
        match self {
            FibResult::Success { .. } => FibCode::Success.as_i32(),
            FibResult::NoNeighbor { .. } => FibCode::NoNeighbor.as_i32(),
            FibResult::Other(code) => *code,
        }
    }
}

impl From<FibCode> for FibResult {
    fn from(code: FibCode) -> Self {
        FibResult::Other(code.as_i32())
    }
}

/// Forwarding table lookup service.
///
/// Implementations run on the packet path: no blocking beyond short read
/// locks and no allocation.
pub trait FibLookup: Send + Sync {
    fn lookup(&self, query: &FibQuery) -> FibResult;
}

impl<T: FibLookup + ?Sized> FibLookup for Arc<T> {
    fn lookup(&self, query: &FibQuery) -> FibResult {
        (**self).lookup(query)
    }
}

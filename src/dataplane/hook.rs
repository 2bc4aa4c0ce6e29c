//! Per-packet hook context and dispositions

use super::fib::AddressFamily;
use std::net::IpAddr;

/// Where a packet was received and which counter shard its worker owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookContext {
    pub ifindex: u32,
    pub shard: usize,
}

/// Next hop handed to the neighbor-resolution path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub family: AddressFamily,
    pub addr: IpAddr,
}

/// What the hook tells its caller to do with the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Leave the packet to the regular stack, unmodified.
    Pass,
    Drop,
    /// Transmit the rewritten packet on `ifindex`.
    Redirect { ifindex: u32 },
    /// Transmit on `ifindex` once the next hop's link-layer address is known.
    RedirectNeighbor { ifindex: u32, nexthop: NextHop },
}

//! Packet capture backends
//!
//! AF_PACKET sockets feed ingress frames to the hooks and carry redirected
//! frames out the egress interface.

mod af_packet;
pub mod link;

pub use af_packet::AfPacketSocket;

use crate::Result;
use std::future::Future;

/// Information about a received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxInfo {
    /// Number of bytes received
    pub len: usize,
    /// Frame was sent by this host (looped back by the packet socket)
    pub outgoing: bool,
}

/// Packet capture backend trait
///
/// Shared between the receive task of an interface and every task that
/// transmits on it, so both directions take `&self`.
pub trait Capture: Send + Sync {
    /// Receive a packet into the provided buffer
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = Result<RxInfo>> + Send;

    /// Send a packet
    fn send(&self, buf: &[u8]) -> impl Future<Output = Result<usize>> + Send;
}

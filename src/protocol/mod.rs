//! Frame builders for the control plane
//!
//! The packet path reads headers through `fibhook_packet`; the frames built
//! here are the ones the daemon originates itself (ARP requests and Neighbor
//! Solicitations).

pub mod arp;
pub mod ethernet;
pub mod icmpv6;
pub mod ipv6;
pub mod types;

pub use types::*;

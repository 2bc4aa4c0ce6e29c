//! Bounds-checked header access for the forwarding and neighbor hooks.
//!
//! Every read goes through [`PacketView`], which carries the frame length and
//! refuses any access past it with [`Truncated`]. Nothing here allocates.

#![no_std]

mod mac;
mod view;

pub use mac::{MacAddr, ParseMacAddrError};
pub use view::{Header, PacketView, PacketViewMut, Truncated};

#[cfg(feature = "arp")]
pub mod arp;
#[cfg(feature = "ethernet")]
pub mod eth;
#[cfg(feature = "icmpv6")]
pub mod icmpv6;
#[cfg(feature = "ipv4")]
pub mod ipv4;
#[cfg(feature = "ipv6")]
pub mod ipv6;

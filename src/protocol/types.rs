//! Common protocol types

use std::net::Ipv6Addr;

pub use fibhook_packet::{MacAddr, ParseMacAddrError};

/// EtherType values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EtherType {
    Ipv4 = 0x0800,
    Arp = 0x0806,
    Ipv6 = 0x86DD,
}

/// Modified EUI-64 link-local address for a MAC (RFC 4291 Appendix A)
pub fn link_local_from_mac(mac: &MacAddr) -> Ipv6Addr {
    let m = &mac.0;
    let eui64: [u8; 8] = [m[0] ^ 0x02, m[1], m[2], 0xff, 0xfe, m[3], m[4], m[5]];

    Ipv6Addr::new(
        0xfe80,
        0,
        0,
        0,
        u16::from_be_bytes([eui64[0], eui64[1]]),
        u16::from_be_bytes([eui64[2], eui64[3]]),
        u16::from_be_bytes([eui64[4], eui64[5]]),
        u16::from_be_bytes([eui64[6], eui64[7]]),
    )
}

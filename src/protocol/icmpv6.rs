//! ICMPv6 Neighbor Discovery messages - RFC 4861

use super::MacAddr;
use std::net::Ipv6Addr;

/// NS/NA body: 4 (header) + 4 (reserved/flags) + 16 (target)
pub const NDP_MSG_SIZE: usize = 24;

pub const TYPE_NEIGHBOR_SOLICITATION: u8 = 135;
pub const OPTION_SOURCE_LINK_LAYER_ADDRESS: u8 = 1;

/// Neighbor Solicitation message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborSolicitation {
    pub target_addr: Ipv6Addr,
    pub source_link_addr: Option<MacAddr>,
}

impl NeighborSolicitation {
    pub fn new(target_addr: Ipv6Addr, source_link_addr: Option<MacAddr>) -> Self {
        Self {
            target_addr,
            source_link_addr,
        }
    }

    /// Build NS message bytes (ICMPv6 payload, without IPv6 header).
    /// The checksum is left zero.
    pub fn to_bytes(&self) -> Vec<u8> {
        let option_len = if self.source_link_addr.is_some() {
            8
        } else {
            0
        };
        let mut buf = vec![0u8; NDP_MSG_SIZE + option_len];

        buf[0] = TYPE_NEIGHBOR_SOLICITATION;
        buf[8..24].copy_from_slice(&self.target_addr.octets());

        if let Some(mac) = &self.source_link_addr {
            buf[24] = OPTION_SOURCE_LINK_LAYER_ADDRESS;
            buf[25] = 1; // Length in units of 8 bytes
            buf[26..32].copy_from_slice(&mac.0);
        }

        buf
    }
}

/// Solicited-node multicast address ff02::1:ffXX:XXXX for `target`
pub fn solicited_node_multicast(target: &Ipv6Addr) -> Ipv6Addr {
    let o = target.octets();
    Ipv6Addr::new(
        0xff02,
        0,
        0,
        0,
        0,
        1,
        0xff00 | o[13] as u16,
        u16::from_be_bytes([o[14], o[15]]),
    )
}

/// Ethernet multicast address 33:33:XX:XX:XX:XX for an IPv6 multicast group
pub fn multicast_mac(group: &Ipv6Addr) -> MacAddr {
    let o = group.octets();
    MacAddr([0x33, 0x33, o[12], o[13], o[14], o[15]])
}

/// Calculate ICMPv6 checksum with IPv6 pseudo-header
pub fn calculate_checksum(src_addr: &Ipv6Addr, dst_addr: &Ipv6Addr, icmpv6_data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    // Pseudo-header: source and destination address
    for chunk in src_addr.octets().chunks(2) {
        sum = sum.wrapping_add(u16::from_be_bytes([chunk[0], chunk[1]]) as u32);
    }
    for chunk in dst_addr.octets().chunks(2) {
        sum = sum.wrapping_add(u16::from_be_bytes([chunk[0], chunk[1]]) as u32);
    }

    // Pseudo-header: upper-layer packet length
    let length = icmpv6_data.len() as u32;
    sum = sum.wrapping_add(length >> 16);
    sum = sum.wrapping_add(length & 0xFFFF);

    // Pseudo-header: next header (ICMPv6 = 58)
    sum = sum.wrapping_add(58);

    // ICMPv6 message, checksum field treated as zero
    for i in (0..icmpv6_data.len()).step_by(2) {
        let word = if i == 2 {
            0
        } else if i + 1 < icmpv6_data.len() {
            u16::from_be_bytes([icmpv6_data[i], icmpv6_data[i + 1]])
        } else {
            u16::from_be_bytes([icmpv6_data[i], 0])
        };
        sum = sum.wrapping_add(word as u32);
    }

    // Fold 32-bit sum to 16 bits
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Set checksum in ICMPv6 message buffer
pub fn set_checksum(buffer: &mut [u8], src_addr: &Ipv6Addr, dst_addr: &Ipv6Addr) {
    if buffer.len() < 4 {
        return;
    }
    let checksum = calculate_checksum(src_addr, dst_addr, buffer);
    buffer[2..4].copy_from_slice(&checksum.to_be_bytes());
}

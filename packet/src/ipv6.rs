#![cfg(feature = "ipv6")]

// Quoted from RFC 8200
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//   |Version| Traffic Class |           Flow Label                  |
//   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//   |         Payload Length        |  Next Header  |   Hop Limit   |
//   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//   |                                                               |
//   +                                                               +
//   |                                                               |
//   +                         Source Address                        +
//   |                                                               |
//   +                                                               +
//   |                                                               |
//   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//   |                                                               |
//   +                                                               +
//   |                                                               |
//   +                      Destination Address                      +
//   |                                                               |
//   +                                                               +
//   |                                                               |
//   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

use crate::{Header, PacketView, Truncated};
use core::net::Ipv6Addr;

pub const IPV6_HLEN: usize = 40;

pub mod next_header {
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const ICMPV6: u8 = 58;
}

/// Fixed IPv6 header. Extension headers are not walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Hdr {
    pub version_traffic_class_flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source_address: [u8; 16],
    pub destination_address: [u8; 16],
}

impl Ipv6Hdr {
    #[inline(always)]
    pub fn version(&self) -> u8 {
        (self.version_traffic_class_flow_label >> 28) as u8
    }

    #[inline(always)]
    pub fn traffic_class(&self) -> u8 {
        (self.version_traffic_class_flow_label >> 20) as u8
    }

    #[inline(always)]
    pub fn flow_label(&self) -> u32 {
        self.version_traffic_class_flow_label & 0x000F_FFFF
    }

    /// Traffic class and flow label together, version bits cleared.
    #[inline(always)]
    pub fn flowinfo(&self) -> u32 {
        self.version_traffic_class_flow_label & 0x0FFF_FFFF
    }

    #[inline(always)]
    pub fn src_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.source_address)
    }

    #[inline(always)]
    pub fn dst_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.destination_address)
    }
}

impl Header for Ipv6Hdr {
    const LEN: usize = IPV6_HLEN;

    #[inline(always)]
    fn read(view: &PacketView<'_>, offset: usize) -> Result<Self, Truncated> {
        let b: [u8; IPV6_HLEN] = view.array(offset)?;
        let mut source_address = [0u8; 16];
        let mut destination_address = [0u8; 16];
        source_address.copy_from_slice(&b[8..24]);
        destination_address.copy_from_slice(&b[24..40]);
        Ok(Self {
            version_traffic_class_flow_label: u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            payload_length: u16::from_be_bytes([b[4], b[5]]),
            next_header: b[6],
            hop_limit: b[7],
            source_address,
            destination_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> [u8; IPV6_HLEN] {
        let mut b = [0u8; IPV6_HLEN];
        // version 6, traffic class 0xb8, flow label 0x12345
        b[0..4].copy_from_slice(&[0x6b, 0x81, 0x23, 0x45]);
        b[4..6].copy_from_slice(&32u16.to_be_bytes());
        b[6] = next_header::ICMPV6;
        b[7] = 255;
        b[8..24].copy_from_slice(&Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1).octets());
        b[24..40].copy_from_slice(&Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1).octets());
        b
    }

    #[test]
    fn test_read_header() {
        let buf = header();
        let hdr: Ipv6Hdr = PacketView::new(&buf).header(0).unwrap();
        assert_eq!(hdr.version(), 6);
        assert_eq!(hdr.traffic_class(), 0xb8);
        assert_eq!(hdr.flow_label(), 0x12345);
        assert_eq!(hdr.flowinfo(), 0x0b81_2345);
        assert_eq!(hdr.payload_length, 32);
        assert_eq!(hdr.next_header, next_header::ICMPV6);
        assert_eq!(hdr.src_addr(), Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1));
        assert_eq!(hdr.dst_addr(), Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1));
    }

    #[test]
    fn test_read_truncated() {
        let buf = header();
        let view = PacketView::new(&buf[..39]);
        assert_eq!(view.header::<Ipv6Hdr>(0), Err(Truncated));
    }
}

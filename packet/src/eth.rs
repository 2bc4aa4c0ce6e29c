#![cfg(feature = "ethernet")]

// Quoted in part from IEEE Std 802.3-2022
// 6 OCTETS DESTINATION ADDRESS
// 6 OCTETS SOURCE ADDRESS
// 2 OCTETS LENGTH/TYPE

use crate::{Header, MacAddr, PacketView, Truncated};

pub const ETH_HLEN: usize = 14;
/// Both MAC address fields at the start of the frame.
pub const ETH_ADDRS_LEN: usize = 12;
pub const VLAN_HLEN: usize = 4;

pub mod ether_type {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
    pub const QINQ: u16 = 0x88A8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthHdr {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ether_type: u16,
}

impl Header for EthHdr {
    const LEN: usize = ETH_HLEN;

    #[inline(always)]
    fn read(view: &PacketView<'_>, offset: usize) -> Result<Self, Truncated> {
        let b: [u8; ETH_HLEN] = view.array(offset)?;
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&b[0..6]);
        src.copy_from_slice(&b[6..12]);
        Ok(Self {
            dst: MacAddr(dst),
            src: MacAddr(src),
            ether_type: u16::from_be_bytes([b[12], b[13]]),
        })
    }
}

// IEEE 802.1Q tag as it follows the outer EtherType
// 2 OCTETS TAG CONTROL INFORMATION (PCP, DEI, VID)
// 2 OCTETS ENCAPSULATED LENGTH/TYPE
#[cfg(feature = "vlan")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanHdr {
    pub tci: u16,
    pub encapsulated_proto: u16,
}

#[cfg(feature = "vlan")]
impl VlanHdr {
    #[inline(always)]
    pub fn vid(&self) -> u16 {
        self.tci & 0x0FFF
    }
}

#[cfg(feature = "vlan")]
impl Header for VlanHdr {
    const LEN: usize = VLAN_HLEN;

    #[inline(always)]
    fn read(view: &PacketView<'_>, offset: usize) -> Result<Self, Truncated> {
        let b: [u8; VLAN_HLEN] = view.array(offset)?;
        Ok(Self {
            tci: u16::from_be_bytes([b[0], b[1]]),
            encapsulated_proto: u16::from_be_bytes([b[2], b[3]]),
        })
    }
}

/// Where the L3 header starts and what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2Info {
    pub ether_type: u16,
    pub l3_offset: usize,
    /// TCI of the single tag that was skipped, if any.
    pub vlan_tci: Option<u16>,
}

/// Skips the Ethernet header and at most one 802.1Q/802.1AD tag.
///
/// A second tag is not unwrapped: the first tag's encapsulated protocol is
/// returned as-is.
#[inline(always)]
pub fn parse_l2(view: &PacketView<'_>) -> Result<L2Info, Truncated> {
    let eth: EthHdr = view.header(0)?;
    skip_vlan(
        view,
        L2Info {
            ether_type: eth.ether_type,
            l3_offset: ETH_HLEN,
            vlan_tci: None,
        },
    )
}

#[cfg(feature = "vlan")]
#[inline(always)]
fn skip_vlan(view: &PacketView<'_>, l2: L2Info) -> Result<L2Info, Truncated> {
    if l2.ether_type != ether_type::VLAN && l2.ether_type != ether_type::QINQ {
        return Ok(l2);
    }
    let vlan: VlanHdr = view.header(l2.l3_offset)?;
    Ok(L2Info {
        ether_type: vlan.encapsulated_proto,
        l3_offset: l2.l3_offset + VLAN_HLEN,
        vlan_tci: Some(vlan.tci),
    })
}

#[cfg(not(feature = "vlan"))]
#[inline(always)]
fn skip_vlan(_view: &PacketView<'_>, l2: L2Info) -> Result<L2Info, Truncated> {
    Ok(l2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ether_type: u16, rest: &[u8]) -> [u8; 64] {
        let mut buf = [0u8; 64];
        buf[0..6].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
        buf[6..12].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);
        buf[12..14].copy_from_slice(&ether_type.to_be_bytes());
        buf[14..14 + rest.len()].copy_from_slice(rest);
        buf
    }

    #[test]
    fn test_eth_header() {
        let buf = frame(ether_type::IPV4, &[]);
        let eth: EthHdr = PacketView::new(&buf).header(0).unwrap();
        assert_eq!(eth.dst, MacAddr([0x02, 0, 0, 0, 0, 0x01]));
        assert_eq!(eth.src, MacAddr([0x02, 0, 0, 0, 0, 0x02]));
        assert_eq!(eth.ether_type, ether_type::IPV4);
    }

    #[test]
    fn test_parse_l2_untagged() {
        let buf = frame(ether_type::IPV6, &[]);
        let l2 = parse_l2(&PacketView::new(&buf)).unwrap();
        assert_eq!(l2.ether_type, ether_type::IPV6);
        assert_eq!(l2.l3_offset, ETH_HLEN);
        assert_eq!(l2.vlan_tci, None);
    }

    #[cfg(feature = "vlan")]
    #[test]
    fn test_parse_l2_single_tag() {
        let buf = frame(ether_type::VLAN, &[0x00, 0x64, 0x08, 0x06]);
        let l2 = parse_l2(&PacketView::new(&buf)).unwrap();
        assert_eq!(l2.ether_type, ether_type::ARP);
        assert_eq!(l2.l3_offset, 18);
        assert_eq!(l2.vlan_tci, Some(100));
    }

    #[cfg(feature = "vlan")]
    #[test]
    fn test_parse_l2_double_tag_not_unwrapped() {
        let buf = frame(ether_type::QINQ, &[0x00, 0x0a, 0x81, 0x00, 0x00, 0x14]);
        let l2 = parse_l2(&PacketView::new(&buf)).unwrap();
        assert_eq!(l2.ether_type, ether_type::VLAN);
        assert_eq!(l2.l3_offset, 18);
    }

    #[test]
    fn test_parse_l2_truncated() {
        let buf = frame(ether_type::VLAN, &[]);
        assert_eq!(parse_l2(&PacketView::new(&buf[..13])), Err(Truncated));
        assert_eq!(parse_l2(&PacketView::new(&buf[..17])), Err(Truncated));
    }
}

#![cfg(feature = "arp")]

// Quoted from RFC 826
// 16.bit: (ar$hrd) Hardware address space (e.g., Ethernet,
//                  Packet Radio Net.)
// 16.bit: (ar$pro) Protocol address space.  For Ethernet
//                  hardware, this is from the set of type
//                  fields ether_typ$<protocol>.
//  8.bit: (ar$hln) byte length of each hardware address
//  8.bit: (ar$pln) byte length of each protocol address
// 16.bit: (ar$op)  opcode (ares_op$REQUEST | ares_op$REPLY)
// nbytes: (ar$sha) Hardware address of sender of this
//                  packet, n from the ar$hln field.
// mbytes: (ar$spa) Protocol address of sender of this
//                  packet, m from the ar$pln field.
// nbytes: (ar$tha) Hardware address of target of this
//                  packet (if known).
// mbytes: (ar$tpa) Protocol address of target.
use crate::{Header, MacAddr, PacketView, Truncated};
use core::net::Ipv4Addr;

/// Ethernet/IPv4 ARP body length.
pub const ARP_ETH_IPV4_LEN: usize = 28;

pub const HRD_ETHERNET: u16 = 1;
pub const HLN_ETHERNET: u8 = 6;
pub const PLN_IPV4: u8 = 4;

pub mod op {
    pub const REQUEST: u16 = 1;
    pub const REPLY: u16 = 2;
}

/// ARP body with Ethernet hardware and IPv4 protocol addresses.
///
/// `hln` and `pln` are carried as read; callers check them before trusting
/// the address fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpHdr {
    pub hrd: u16,
    pub pro: u16,
    pub hln: u8,
    pub pln: u8,
    pub op: u16,
    pub sha: MacAddr,
    pub spa: [u8; 4],
    pub tha: MacAddr,
    pub tpa: [u8; 4],
}

impl ArpHdr {
    /// Hardware and protocol lengths are those of Ethernet/IPv4.
    #[inline(always)]
    pub fn is_eth_ipv4(&self) -> bool {
        self.hln == HLN_ETHERNET && self.pln == PLN_IPV4
    }

    /// Sender and target protocol addresses are equal.
    #[inline(always)]
    pub fn is_gratuitous(&self) -> bool {
        self.spa == self.tpa
    }

    #[inline(always)]
    pub fn sender_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.spa)
    }

    #[inline(always)]
    pub fn target_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.tpa)
    }
}

impl Header for ArpHdr {
    const LEN: usize = ARP_ETH_IPV4_LEN;

    #[inline(always)]
    fn read(view: &PacketView<'_>, offset: usize) -> Result<Self, Truncated> {
        let b: [u8; ARP_ETH_IPV4_LEN] = view.array(offset)?;
        let mut sha = [0u8; 6];
        let mut tha = [0u8; 6];
        sha.copy_from_slice(&b[8..14]);
        tha.copy_from_slice(&b[18..24]);
        Ok(Self {
            hrd: u16::from_be_bytes([b[0], b[1]]),
            pro: u16::from_be_bytes([b[2], b[3]]),
            hln: b[4],
            pln: b[5],
            op: u16::from_be_bytes([b[6], b[7]]),
            sha: MacAddr(sha),
            spa: [b[14], b[15], b[16], b[17]],
            tha: MacAddr(tha),
            tpa: [b[24], b[25], b[26], b[27]],
        })
    }
}

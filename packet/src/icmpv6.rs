#![cfg(feature = "icmpv6")]

// Quoted from RFC 4443 Internet Control Message Protocol (ICMPv6) for the Internet Protocol Version 6 (IPv6) Specification
// Message General Format
//  0               1               2               3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                         Message Body                          +
// |                                                               |

use crate::{Header, MacAddr, PacketView, Truncated};

/// Type, code, checksum and the first body word.
pub const ICMPV6_HLEN: usize = 8;
pub const ND_TARGET_LEN: usize = 16;
pub const ND_OPT_HLEN: usize = 2;
/// Option lengths are counted in units of this many bytes.
pub const ND_OPT_UNIT: usize = 8;
/// Largest option length accepted while scanning, in units.
pub const ND_OPT_MAX_UNITS: u8 = 32;
/// Options visited per Neighbor Advertisement before giving up.
pub const NA_MAX_OPTS: usize = 6;

pub mod types {
    pub const ECHO_REQUEST: u8 = 128;
    pub const ECHO_REPLY: u8 = 129;
    pub const ROUTER_SOLICITATION: u8 = 133;
    pub const ROUTER_ADVERTISEMENT: u8 = 134;
    pub const NEIGHBOR_SOLICITATION: u8 = 135;
    pub const NEIGHBOR_ADVERTISEMENT: u8 = 136;
}

pub mod nd_option {
    pub const SOURCE_LINK_LAYER_ADDRESS: u8 = 1;
    pub const TARGET_LINK_LAYER_ADDRESS: u8 = 2;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icmpv6Hdr {
    pub type_: u8,
    pub code: u8,
    pub checksum: u16,
    pub body: [u8; 4],
}

impl Header for Icmpv6Hdr {
    const LEN: usize = ICMPV6_HLEN;

    #[inline(always)]
    fn read(view: &PacketView<'_>, offset: usize) -> Result<Self, Truncated> {
        let b: [u8; ICMPV6_HLEN] = view.array(offset)?;
        Ok(Self {
            type_: b[0],
            code: b[1],
            checksum: u16::from_be_bytes([b[2], b[3]]),
            body: [b[4], b[5], b[6], b[7]],
        })
    }
}

// Quoted from RFC 4861 Neighbor Discovery for IP version 6 (IPv6)
// Neighbor Advertisement Message Format
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |R|S|O|                     Reserved                            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                                                               +
// |                                                               |
// +                       Target Address                          +
// |                                                               |
// +                                                               +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Options ...
// +-+-+-+-+-+-+-+-+-+-+-+-+-

impl Icmpv6Hdr {
    #[inline(always)]
    pub fn is_neighbor_advertisement(&self) -> bool {
        self.type_ == types::NEIGHBOR_ADVERTISEMENT
    }

    /// R, S and O bits of a Neighbor Advertisement.
    #[inline(always)]
    pub fn na_flags(&self) -> u8 {
        self.body[0] & 0xE0
    }
}

// Quoted from RFC 4861
// Option Format
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |    Length     |              ...              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// ~                              ...                              ~
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdOptionHdr {
    pub kind: u8,
    /// Length of the whole option in units of 8 bytes.
    pub len_units: u8,
}

impl NdOptionHdr {
    #[inline(always)]
    pub fn len_bytes(&self) -> usize {
        self.len_units as usize * ND_OPT_UNIT
    }
}

impl Header for NdOptionHdr {
    const LEN: usize = ND_OPT_HLEN;

    #[inline(always)]
    fn read(view: &PacketView<'_>, offset: usize) -> Result<Self, Truncated> {
        let b: [u8; ND_OPT_HLEN] = view.array(offset)?;
        Ok(Self {
            kind: b[0],
            len_units: b[1],
        })
    }
}

/// Walks the options of a Neighbor Advertisement starting at `offset` and
/// returns the first Target Link-Layer Address.
///
/// At most [`NA_MAX_OPTS`] options are visited. The walk stops at the first
/// option that is zero length, longer than [`ND_OPT_MAX_UNITS`] units, or
/// runs past the end of the frame.
pub fn find_target_lladdr(view: &PacketView<'_>, mut offset: usize) -> Option<MacAddr> {
    for _ in 0..NA_MAX_OPTS {
        let opt: NdOptionHdr = view.header(offset).ok()?;
        if opt.len_units == 0 || opt.len_units > ND_OPT_MAX_UNITS {
            return None;
        }
        let len = opt.len_bytes();
        if !view.fits(offset, len) {
            return None;
        }
        if opt.kind == nd_option::TARGET_LINK_LAYER_ADDRESS && len >= ND_OPT_UNIT {
            return view.array::<6>(offset + ND_OPT_HLEN).ok().map(MacAddr);
        }
        offset += len;
    }
    None
}

//! IPv6 header construction - RFC 8200

use std::net::Ipv6Addr;

/// IPv6 header size (fixed)
pub const HEADER_SIZE: usize = 40;

/// Builder for constructing IPv6 packets
#[derive(Debug, Clone)]
pub struct Ipv6Builder {
    next_header: u8,
    hop_limit: u8,
    src_addr: Ipv6Addr,
    dst_addr: Ipv6Addr,
    payload: Vec<u8>,
}

impl Ipv6Builder {
    pub fn new() -> Self {
        Self {
            next_header: 0,
            hop_limit: 64,
            src_addr: Ipv6Addr::UNSPECIFIED,
            dst_addr: Ipv6Addr::UNSPECIFIED,
            payload: Vec::new(),
        }
    }

    pub fn next_header(mut self, nh: u8) -> Self {
        self.next_header = nh;
        self
    }

    pub fn hop_limit(mut self, hl: u8) -> Self {
        self.hop_limit = hl;
        self
    }

    pub fn src_addr(mut self, addr: Ipv6Addr) -> Self {
        self.src_addr = addr;
        self
    }

    pub fn dst_addr(mut self, addr: Ipv6Addr) -> Self {
        self.dst_addr = addr;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Traffic class and flow label are always zero.
    pub fn build(self) -> Vec<u8> {
        let payload_length = self.payload.len() as u16;
        let mut buffer = vec![0u8; HEADER_SIZE + self.payload.len()];

        buffer[0] = 0x60;
        buffer[4..6].copy_from_slice(&payload_length.to_be_bytes());
        buffer[6] = self.next_header;
        buffer[7] = self.hop_limit;
        buffer[8..24].copy_from_slice(&self.src_addr.octets());
        buffer[24..40].copy_from_slice(&self.dst_addr.octets());
        buffer[HEADER_SIZE..].copy_from_slice(&self.payload);

        buffer
    }
}

impl Default for Ipv6Builder {
    fn default() -> Self {
        Self::new()
    }
}

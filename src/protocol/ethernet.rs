//! Ethernet frame construction

use super::MacAddr;

/// Maximum frame size without VLAN tag
pub const MAX_FRAME_SIZE: usize = 1518;

/// Builder for constructing Ethernet frames
pub struct FrameBuilder {
    buffer: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_SIZE),
        }
    }

    pub fn dst_mac(mut self, mac: MacAddr) -> Self {
        self.buffer.extend_from_slice(&mac.0);
        self
    }

    pub fn src_mac(mut self, mac: MacAddr) -> Self {
        self.buffer.extend_from_slice(&mac.0);
        self
    }

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.buffer.extend_from_slice(&ethertype.to_be_bytes());
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.buffer.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EtherType;
    use fibhook_packet::eth::EthHdr;
    use fibhook_packet::PacketView;

    #[test]
    fn test_frame_builder() {
        let frame = FrameBuilder::new()
            .dst_mac(MacAddr::BROADCAST)
            .src_mac(MacAddr([0x02, 0, 0, 0, 0, 1]))
            .ethertype(EtherType::Arp as u16)
            .payload(&[1, 2, 3])
            .build();

        assert_eq!(frame.len(), 17);
        let eth: EthHdr = PacketView::new(&frame).header(0).unwrap();
        assert!(eth.dst.is_broadcast());
        assert_eq!(eth.src, MacAddr([0x02, 0, 0, 0, 0, 1]));
        assert_eq!(eth.ether_type, 0x0806);
        assert_eq!(&frame[14..], &[1, 2, 3]);
    }
}

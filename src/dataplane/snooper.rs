//! Neighbor binding snooper
//!
//! Passive observer on the ingress path: pulls IP to MAC bindings out of ARP
//! and ICMPv6 Neighbor Advertisements and publishes them as events. The
//! packet is never modified and always passed.

use super::events::{EventSender, NeighborBinding};
use super::hook::{Disposition, HookContext};
use fibhook_packet::arp::{op, ArpHdr};
use fibhook_packet::eth::{ether_type, parse_l2};
use fibhook_packet::icmpv6::{find_target_lladdr, Icmpv6Hdr, ICMPV6_HLEN, ND_TARGET_LEN};
use fibhook_packet::ipv6::{next_header, Ipv6Hdr, IPV6_HLEN};
use fibhook_packet::PacketView;
use tracing::trace;

/// Extracts at most one binding from a frame received on `ifindex`.
pub fn extract_binding(view: &PacketView<'_>, ifindex: u32) -> Option<NeighborBinding> {
    let l2 = parse_l2(view).ok()?;
    match l2.ether_type {
        ether_type::ARP => arp_binding(view, l2.l3_offset, ifindex),
        ether_type::IPV6 => na_binding(view, l2.l3_offset, ifindex),
        _ => None,
    }
}

/// Gratuitous requests and replies announce a mapping; an ordinary reply
/// teaches the responder's own. Ordinary requests say nothing reliable about
/// the sender owning its address, so they are skipped.
fn arp_binding(view: &PacketView<'_>, offset: usize, ifindex: u32) -> Option<NeighborBinding> {
    let arp: ArpHdr = view.header(offset).ok()?;
    if !arp.is_eth_ipv4() {
        return None;
    }

    let mac = match (arp.is_gratuitous(), arp.op) {
        (true, op::REQUEST) => arp.sha,
        (true, op::REPLY) => arp.tha,
        (false, op::REPLY) => arp.sha,
        _ => return None,
    };
    Some(NeighborBinding::ipv4(ifindex, mac, arp.spa))
}

fn na_binding(view: &PacketView<'_>, offset: usize, ifindex: u32) -> Option<NeighborBinding> {
    let ip6: Ipv6Hdr = view.header(offset).ok()?;
    if ip6.next_header != next_header::ICMPV6 {
        return None;
    }

    let icmp_offset = offset + IPV6_HLEN;
    let icmp: Icmpv6Hdr = view.header(icmp_offset).ok()?;
    if !icmp.is_neighbor_advertisement() {
        return None;
    }

    let target_offset = icmp_offset + ICMPV6_HLEN;
    let target: [u8; ND_TARGET_LEN] = view.array(target_offset).ok()?;
    let mac = find_target_lladdr(view, target_offset + ND_TARGET_LEN)?;
    Some(NeighborBinding::ipv6(ifindex, mac, target))
}

/// Snooping hook bound to an event channel.
#[derive(Debug, Clone)]
pub struct NeighborSnooper {
    events: EventSender,
}

impl NeighborSnooper {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Observes one frame. Always returns [`Disposition::Pass`].
    pub fn observe(&self, ctx: &HookContext, frame: &[u8]) -> Disposition {
        if let Some(binding) = extract_binding(&PacketView::new(frame), ctx.ifindex) {
            let sent = self.events.emit(&binding);
            trace!(
                ifindex = ctx.ifindex,
                ip = %binding.ip_addr(),
                mac = %binding.mac,
                sent,
                "neighbor binding observed"
            );
        }
        Disposition::Pass
    }
}

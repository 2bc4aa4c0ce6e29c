//! Forwarding engine
//!
//! Parses the outer Ethernet and IP headers, asks the FIB where the packet
//! goes and rewrites the Ethernet addresses in place. Every failure ends in a
//! [`Disposition`] and an outcome counter; nothing here allocates or returns
//! an error.

use super::fib::{AddressFamily, FibCode, FibLookup, FibQuery, FibResult};
use super::hook::{Disposition, HookContext, NextHop};
use super::remap::InterfaceRemap;
use super::stats::{Outcome, OutcomeCounters};
use fibhook_packet::eth::{ether_type, ETH_ADDRS_LEN, ETH_HLEN};
use fibhook_packet::ipv4::Ipv4Hdr;
use fibhook_packet::ipv6::Ipv6Hdr;
use fibhook_packet::{PacketView, PacketViewMut, Truncated};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::trace;

/// Offset of the outer EtherType. This path does not look past VLAN tags.
const ETHER_TYPE_OFFSET: usize = 12;

enum ParseFailure {
    Truncated,
    NotIp,
}

impl From<Truncated> for ParseFailure {
    fn from(_: Truncated) -> Self {
        ParseFailure::Truncated
    }
}

/// Ingress forwarding hook.
pub struct ForwardingEngine<F> {
    fib: F,
    remap: Arc<InterfaceRemap>,
    counters: Arc<OutcomeCounters>,
}

impl<F: FibLookup> ForwardingEngine<F> {
    pub fn new(fib: F, remap: Arc<InterfaceRemap>, counters: Arc<OutcomeCounters>) -> Self {
        Self {
            fib,
            remap,
            counters,
        }
    }

    pub fn counters(&self) -> &Arc<OutcomeCounters> {
        &self.counters
    }

    /// Runs one packet through parse, lookup and rewrite.
    pub fn process(&self, ctx: &HookContext, frame: &mut [u8]) -> Disposition {
        let bytes = frame.len() as u64;

        let query = match self.build_query(ctx, &PacketView::new(frame)) {
            Ok(query) => query,
            Err(ParseFailure::Truncated) | Err(ParseFailure::NotIp) => {
                return self.finish(ctx, Outcome::HeaderParseError, bytes, Disposition::Pass);
            }
        };

        let result = self.fib.lookup(&query);
        let code = result.code();
        self.counters.record_fib(ctx.shard, code, bytes);

        if code < 0 || code == FibCode::NotForwarded.as_i32() {
            return self.finish(ctx, Outcome::NotForwarded, bytes, Disposition::Pass);
        }

        let mut view = PacketViewMut::new(frame);
        if view.store_bytes(0, &[0u8; ETH_ADDRS_LEN]).is_err() {
            return self.finish(ctx, Outcome::StoreMacError, bytes, Disposition::Drop);
        }

        match result {
            FibResult::Success {
                ifindex,
                smac,
                dmac,
            } => {
                if !view.as_view().fits(0, ETH_HLEN) {
                    return self.finish(ctx, Outcome::SizeExceeded, bytes, Disposition::Drop);
                }
                let mut addrs = [0u8; ETH_ADDRS_LEN];
                addrs[..6].copy_from_slice(&dmac.0);
                addrs[6..].copy_from_slice(&smac.0);
                if view.store_bytes(0, &addrs).is_err() {
                    return self.finish(ctx, Outcome::SizeExceeded, bytes, Disposition::Drop);
                }
                self.finish(ctx, Outcome::Route, bytes, Disposition::Redirect { ifindex })
            }
            FibResult::NoNeighbor { ifindex, nexthop } => {
                let nexthop = NextHop {
                    family: query.family,
                    addr: nexthop,
                };
                self.finish(
                    ctx,
                    Outcome::RouteNoNeighbor,
                    bytes,
                    Disposition::RedirectNeighbor { ifindex, nexthop },
                )
            }
            FibResult::Other(_) => self.finish(ctx, Outcome::LastExit, bytes, Disposition::Drop),
        }
    }

    fn build_query(&self, ctx: &HookContext, view: &PacketView<'_>) -> Result<FibQuery, ParseFailure> {
        let proto = view.u16_be_at(ETHER_TYPE_OFFSET)?;
        let ifindex = self.remap.resolve(ctx.ifindex);

        match proto {
            ether_type::IPV4 => {
                let ip: Ipv4Hdr = view.header(ETH_HLEN)?;
                Ok(FibQuery {
                    family: AddressFamily::Ipv4,
                    tos: ip.type_of_service,
                    flowinfo: 0,
                    l4_protocol: ip.protocol,
                    sport: 0,
                    dport: 0,
                    tot_len: 0,
                    src: IpAddr::V4(ip.src_addr()),
                    dst: IpAddr::V4(ip.dst_addr()),
                    ifindex,
                })
            }
            ether_type::IPV6 => {
                let ip: Ipv6Hdr = view.header(ETH_HLEN)?;
                Ok(FibQuery {
                    family: AddressFamily::Ipv6,
                    tos: 0,
                    flowinfo: ip.flowinfo(),
                    l4_protocol: ip.next_header,
                    sport: 0,
                    dport: 0,
                    tot_len: 0,
                    src: IpAddr::V6(ip.src_addr()),
                    dst: IpAddr::V6(ip.dst_addr()),
                    ifindex,
                })
            }
            _ => Err(ParseFailure::NotIp),
        }
    }

    #[inline]
    fn finish(
        &self,
        ctx: &HookContext,
        outcome: Outcome,
        bytes: u64,
        disposition: Disposition,
    ) -> Disposition {
        self.counters.record_outcome(ctx.shard, outcome, bytes);
        trace!(ifindex = ctx.ifindex, outcome = outcome.name(), ?disposition, "forward");
        disposition
    }
}

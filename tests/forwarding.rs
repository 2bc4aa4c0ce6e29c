//! Forwarding engine dispositions and rewrites against a scripted FIB.

use fibhook::dataplane::{
    AddressFamily, Disposition, FibCode, FibLookup, FibQuery, FibResult, ForwardingEngine,
    HookContext, InterfaceRemap, NextHop, Outcome, OutcomeCounters,
};
use fibhook::protocol::MacAddr;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

const SMAC: MacAddr = MacAddr([0x02, 0, 0, 0, 2, 1]);
const DMAC: MacAddr = MacAddr([0x02, 0, 0, 0, 2, 2]);

/// Answers every lookup with the same result and remembers the last query.
struct ScriptedFib {
    result: FibResult,
    last: Mutex<Option<FibQuery>>,
}

impl ScriptedFib {
    fn new(result: FibResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            last: Mutex::new(None),
        })
    }

    fn last(&self) -> FibQuery {
        self.last.lock().unwrap().expect("no lookup made")
    }
}

impl FibLookup for ScriptedFib {
    fn lookup(&self, query: &FibQuery) -> FibResult {
        *self.last.lock().unwrap() = Some(*query);
        self.result
    }
}

struct Harness {
    fib: Arc<ScriptedFib>,
    remap: Arc<InterfaceRemap>,
    engine: ForwardingEngine<Arc<ScriptedFib>>,
}

fn harness(result: FibResult) -> Harness {
    let fib = ScriptedFib::new(result);
    let remap = Arc::new(InterfaceRemap::new());
    let counters = Arc::new(OutcomeCounters::new(2));
    let engine = ForwardingEngine::new(fib.clone(), remap.clone(), counters);
    Harness { fib, remap, engine }
}

fn ctx(ifindex: u32) -> HookContext {
    HookContext { ifindex, shard: 1 }
}

fn ipv4_packet(tos: u8, protocol: u8, src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
    let mut p = vec![0x11; 6];
    p.extend_from_slice(&[0x22; 6]);
    p.extend_from_slice(&[0x08, 0x00]);
    p.extend_from_slice(&[0x45, tos, 0x00, 0x1c, 0, 0, 0x40, 0, 64, protocol, 0, 0]);
    p.extend_from_slice(&src);
    p.extend_from_slice(&dst);
    p.extend_from_slice(&[0u8; 8]);
    p
}

fn ipv6_packet(first_word: u32, next_header: u8, src: &str, dst: &str) -> Vec<u8> {
    let src: std::net::Ipv6Addr = src.parse().unwrap();
    let dst: std::net::Ipv6Addr = dst.parse().unwrap();
    let mut p = vec![0x11; 6];
    p.extend_from_slice(&[0x22; 6]);
    p.extend_from_slice(&[0x86, 0xdd]);
    p.extend_from_slice(&first_word.to_be_bytes());
    p.extend_from_slice(&[0x00, 0x08, next_header, 64]);
    p.extend_from_slice(&src.octets());
    p.extend_from_slice(&dst.octets());
    p.extend_from_slice(&[0u8; 8]);
    p
}

fn success(ifindex: u32) -> FibResult {
    FibResult::Success {
        ifindex,
        smac: SMAC,
        dmac: DMAC,
    }
}

#[test]
fn test_ipv4_success_rewrites_and_redirects() {
    let h = harness(success(3));
    let mut pkt = ipv4_packet(0x10, 6, [10, 0, 1, 2], [10, 0, 2, 2]);
    let original = pkt.clone();

    let d = h.engine.process(&ctx(2), &mut pkt);

    assert_eq!(d, Disposition::Redirect { ifindex: 3 });
    assert_eq!(&pkt[0..6], &DMAC.0);
    assert_eq!(&pkt[6..12], &SMAC.0);
    assert_eq!(&pkt[12..], &original[12..]);

    let q = h.fib.last();
    assert_eq!(q.family, AddressFamily::Ipv4);
    assert_eq!(q.tos, 0x10);
    assert_eq!(q.l4_protocol, 6);
    assert_eq!(q.src, "10.0.1.2".parse::<IpAddr>().unwrap());
    assert_eq!(q.dst, "10.0.2.2".parse::<IpAddr>().unwrap());
    assert_eq!((q.sport, q.dport, q.tot_len), (0, 0, 0));
    assert_eq!(q.ifindex, 2);

    let snap = h.engine.counters().snapshot();
    assert_eq!(snap.outcome(Outcome::Route).packets, 1);
    assert_eq!(snap.outcome(Outcome::Route).bytes, pkt.len() as u64);
    assert_eq!(snap.fib(FibCode::Success).packets, 1);
}

#[test]
fn test_second_pass_is_noop() {
    let h = harness(success(3));
    let mut pkt = ipv4_packet(0, 17, [10, 0, 1, 2], [10, 0, 2, 2]);

    h.engine.process(&ctx(2), &mut pkt);
    let once = pkt.clone();
    let d = h.engine.process(&ctx(2), &mut pkt);

    assert_eq!(d, Disposition::Redirect { ifindex: 3 });
    assert_eq!(pkt, once);
}

#[test]
fn test_ipv6_no_neighbor_zeroes_and_requests_resolution() {
    let nexthop: IpAddr = "2001:db8:2::fe".parse().unwrap();
    let h = harness(FibResult::NoNeighbor {
        ifindex: 4,
        nexthop,
    });
    let mut pkt = ipv6_packet(0x6abc_def1, 17, "2001:db8:1::2", "2001:db8:2::2");
    let original = pkt.clone();

    let d = h.engine.process(&ctx(2), &mut pkt);

    assert_eq!(
        d,
        Disposition::RedirectNeighbor {
            ifindex: 4,
            nexthop: NextHop {
                family: AddressFamily::Ipv6,
                addr: nexthop,
            },
        }
    );
    assert_eq!(&pkt[0..12], &[0u8; 12]);
    assert_eq!(&pkt[12..], &original[12..]);

    let q = h.fib.last();
    assert_eq!(q.family, AddressFamily::Ipv6);
    assert_eq!(q.flowinfo, 0x0abc_def1);
    assert_eq!(q.l4_protocol, 17);
    assert_eq!(q.tos, 0);

    let snap = h.engine.counters().snapshot();
    assert_eq!(snap.outcome(Outcome::RouteNoNeighbor).packets, 1);
    assert_eq!(snap.fib(FibCode::NoNeighbor).packets, 1);
}

#[test]
fn test_not_forwarded_passes_untouched() {
    let h = harness(FibCode::NotForwarded.into());
    let mut pkt = ipv4_packet(0, 17, [10, 0, 1, 2], [10, 0, 1, 1]);
    let original = pkt.clone();

    assert_eq!(h.engine.process(&ctx(2), &mut pkt), Disposition::Pass);
    assert_eq!(pkt, original);

    let snap = h.engine.counters().snapshot();
    assert_eq!(snap.outcome(Outcome::NotForwarded).packets, 1);
    assert_eq!(snap.fib(FibCode::NotForwarded).packets, 1);
}

#[test]
fn test_negative_and_unknown_codes() {
    // Negative: pass, nothing counted in the lookup slots
    let h = harness(FibResult::Other(-19));
    let mut pkt = ipv4_packet(0, 17, [10, 0, 1, 2], [10, 0, 2, 2]);
    let original = pkt.clone();
    assert_eq!(h.engine.process(&ctx(2), &mut pkt), Disposition::Pass);
    assert_eq!(pkt, original);
    let snap = h.engine.counters().snapshot();
    assert_eq!(snap.outcome(Outcome::NotForwarded).packets, 1);
    assert!(FibCode::ALL.iter().all(|c| snap.fib(*c).packets == 0));

    // Out of range positive: drop after zeroing
    let h = harness(FibResult::Other(42));
    let mut pkt = ipv4_packet(0, 17, [10, 0, 1, 2], [10, 0, 2, 2]);
    assert_eq!(h.engine.process(&ctx(2), &mut pkt), Disposition::Drop);
    assert_eq!(&pkt[0..12], &[0u8; 12]);
    assert_eq!(
        h.engine.counters().snapshot().outcome(Outcome::LastExit).packets,
        1
    );
}

#[test]
fn test_route_errors_drop() {
    for code in [
        FibCode::Blackhole,
        FibCode::Unreachable,
        FibCode::Prohibit,
        FibCode::ForwardingDisabled,
        FibCode::UnsupportedLwt,
        FibCode::FragmentationNeeded,
    ] {
        let h = harness(code.into());
        let mut pkt = ipv4_packet(0, 17, [10, 0, 1, 2], [192, 0, 2, 1]);
        assert_eq!(h.engine.process(&ctx(2), &mut pkt), Disposition::Drop, "{:?}", code);
        assert_eq!(&pkt[0..12], &[0u8; 12]);

        let snap = h.engine.counters().snapshot();
        assert_eq!(snap.outcome(Outcome::LastExit).packets, 1);
        assert_eq!(snap.fib(code).packets, 1);
    }
}

#[test]
fn test_non_ip_and_tagged_frames_pass() {
    let h = harness(success(3));

    let mut arp = vec![0xff; 6];
    arp.extend_from_slice(&[0x22; 6]);
    arp.extend_from_slice(&[0x08, 0x06]);
    arp.extend_from_slice(&[0u8; 28]);

    // VLAN-tagged IPv4 is not unwrapped on this path
    let untagged = ipv4_packet(0, 17, [10, 0, 1, 2], [10, 0, 2, 2]);
    let mut tagged = untagged[..12].to_vec();
    tagged.extend_from_slice(&[0x81, 0x00, 0x00, 0x64]);
    tagged.extend_from_slice(&untagged[12..]);

    for frame in [&mut arp, &mut tagged] {
        let before = frame.clone();
        assert_eq!(h.engine.process(&ctx(2), frame), Disposition::Pass);
        assert_eq!(*frame, before);
    }

    assert!(h.fib.last.lock().unwrap().is_none());
    assert_eq!(
        h.engine
            .counters()
            .snapshot()
            .outcome(Outcome::HeaderParseError)
            .packets,
        2
    );
}

#[test]
fn test_truncated_headers_pass() {
    let h = harness(success(3));
    let full = ipv4_packet(0, 17, [10, 0, 1, 2], [10, 0, 2, 2]);

    // Shorter than Ethernet, and Ethernet without a full IPv4 header
    for len in [0, 5, 13, 14, 33] {
        let mut pkt = full[..len].to_vec();
        let before = pkt.clone();
        assert_eq!(h.engine.process(&ctx(2), &mut pkt), Disposition::Pass);
        assert_eq!(pkt, before);
    }
    assert_eq!(
        h.engine
            .counters()
            .snapshot()
            .outcome(Outcome::HeaderParseError)
            .packets,
        5
    );
}

#[test]
fn test_remap_changes_query_ifindex() {
    let h = harness(FibCode::NotForwarded.into());
    h.remap.insert(7, 3).unwrap();

    let mut pkt = ipv4_packet(0, 17, [10, 0, 1, 2], [10, 0, 2, 2]);
    h.engine.process(&ctx(7), &mut pkt);
    assert_eq!(h.fib.last().ifindex, 3);

    h.engine.process(&ctx(8), &mut pkt);
    assert_eq!(h.fib.last().ifindex, 8);
}

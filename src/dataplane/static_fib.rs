//! In-process FIB
//!
//! Answers [`FibQuery`]s from the configured routing table and the neighbor
//! table, reproducing the kernel lookup's result codes.

use super::fib::{FibCode, FibLookup, FibQuery, FibResult};
use super::neighbor_table::NeighborTable;
use super::routing::{Route, RouteKind, RouteSource, RoutingTable};
use crate::protocol::MacAddr;
use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

/// Interface properties the lookup needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibInterface {
    pub ifindex: u32,
    pub name: String,
    pub mac: MacAddr,
    /// Forwarding enabled for packets arriving here
    pub forwarding: bool,
    pub addrs: Vec<IpNet>,
}

/// Routing + neighbor backed [`FibLookup`].
#[derive(Debug)]
pub struct StaticFib {
    interfaces: RwLock<HashMap<u32, FibInterface>>,
    routes: RwLock<RoutingTable>,
    neighbors: Arc<RwLock<NeighborTable>>,
}

impl StaticFib {
    pub fn new(neighbors: Arc<RwLock<NeighborTable>>) -> Self {
        Self {
            interfaces: RwLock::new(HashMap::new()),
            routes: RwLock::new(RoutingTable::new()),
            neighbors,
        }
    }

    /// Registers an interface and its connected routes.
    pub fn add_interface(&self, iface: FibInterface) {
        {
            let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
            for addr in &iface.addrs {
                routes.add(Route {
                    destination: addr.trunc(),
                    gateway: None,
                    ifindex: Some(iface.ifindex),
                    kind: RouteKind::Unicast,
                    source: RouteSource::Connected,
                });
            }
        }
        self.interfaces
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(iface.ifindex, iface);
    }

    /// Forgets an interface and every route through it.
    pub fn remove_interface(&self, ifindex: u32) -> Option<FibInterface> {
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain_interfaces(|idx| idx != ifindex);
        self.interfaces
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&ifindex)
    }

    pub fn add_route(&self, route: Route) {
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .add(route);
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn neighbors(&self) -> &Arc<RwLock<NeighborTable>> {
        &self.neighbors
    }

    fn is_local(interfaces: &HashMap<u32, FibInterface>, dst: &IpAddr) -> bool {
        interfaces
            .values()
            .any(|iface| iface.addrs.iter().any(|net| net.addr() == *dst))
    }
}

impl FibLookup for StaticFib {
    fn lookup(&self, query: &FibQuery) -> FibResult {
        let interfaces = self.interfaces.read().unwrap_or_else(|e| e.into_inner());

        let Some(ingress) = interfaces.get(&query.ifindex) else {
            return FibResult::Other(-libc::ENODEV);
        };
        if !ingress.forwarding {
            return FibCode::ForwardingDisabled.into();
        }
        if Self::is_local(&interfaces, &query.dst) {
            return FibCode::NotForwarded.into();
        }

        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        let Some(route) = routes.lookup(query.dst) else {
            return FibCode::NotForwarded.into();
        };

        match route.kind {
            RouteKind::Blackhole => return FibCode::Blackhole.into(),
            RouteKind::Unreachable => return FibCode::Unreachable.into(),
            RouteKind::Prohibit => return FibCode::Prohibit.into(),
            RouteKind::Unicast => {}
        }

        let Some(egress) = route.ifindex.and_then(|idx| interfaces.get(&idx)) else {
            return FibCode::NotForwarded.into();
        };
        let nexthop = route.gateway.unwrap_or(query.dst);

        let neighbors = self.neighbors.read().unwrap_or_else(|e| e.into_inner());
        match neighbors.lookup(egress.ifindex, &nexthop) {
            Some((dmac, _)) => FibResult::Success {
                ifindex: egress.ifindex,
                smac: egress.mac,
                dmac,
            },
            None => FibResult::NoNeighbor {
                ifindex: egress.ifindex,
                nexthop,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataplane::fib::AddressFamily;

    const LAN_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 1, 1]);
    const WAN_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 2, 1]);

    fn fib() -> StaticFib {
        let fib = StaticFib::new(Arc::new(RwLock::new(NeighborTable::default())));
        fib.add_interface(FibInterface {
            ifindex: 2,
            name: "eth1".into(),
            mac: LAN_MAC,
            forwarding: true,
            addrs: vec![
                "10.0.1.1/24".parse().unwrap(),
                "2001:db8:1::1/64".parse().unwrap(),
            ],
        });
        fib.add_interface(FibInterface {
            ifindex: 3,
            name: "eth2".into(),
            mac: WAN_MAC,
            forwarding: true,
            addrs: vec!["10.0.2.1/24".parse().unwrap()],
        });
        fib
    }

    fn query(dst: &str, ifindex: u32) -> FibQuery {
        let dst: IpAddr = dst.parse().unwrap();
        let src: IpAddr = match dst {
            IpAddr::V4(_) => "10.0.1.2".parse().unwrap(),
            IpAddr::V6(_) => "2001:db8:1::2".parse().unwrap(),
        };
        FibQuery {
            family: AddressFamily::of(&dst),
            tos: 0,
            flowinfo: 0,
            l4_protocol: 17,
            sport: 0,
            dport: 0,
            tot_len: 0,
            src,
            dst,
            ifindex,
        }
    }

    fn learn(fib: &StaticFib, ifindex: u32, ip: &str, mac: MacAddr) {
        fib.neighbors()
            .write()
            .unwrap()
            .insert(ifindex, ip.parse().unwrap(), mac);
    }

    #[test]
    fn test_connected_with_neighbor() {
        let fib = fib();
        let server = MacAddr([0x02, 0, 0, 0, 2, 2]);
        learn(&fib, 3, "10.0.2.2", server);

        assert_eq!(
            fib.lookup(&query("10.0.2.2", 2)),
            FibResult::Success {
                ifindex: 3,
                smac: WAN_MAC,
                dmac: server
            }
        );
    }

    #[test]
    fn test_connected_without_neighbor() {
        let fib = fib();
        assert_eq!(
            fib.lookup(&query("10.0.2.7", 2)),
            FibResult::NoNeighbor {
                ifindex: 3,
                nexthop: "10.0.2.7".parse().unwrap()
            }
        );
    }

    #[test]
    fn test_gateway_is_next_hop() {
        let fib = fib();
        fib.add_route(Route {
            destination: "0.0.0.0/0".parse().unwrap(),
            gateway: Some("10.0.2.254".parse().unwrap()),
            ifindex: Some(3),
            kind: RouteKind::Unicast,
            source: RouteSource::Static,
        });

        assert_eq!(
            fib.lookup(&query("8.8.8.8", 2)),
            FibResult::NoNeighbor {
                ifindex: 3,
                nexthop: "10.0.2.254".parse().unwrap()
            }
        );

        let gw = MacAddr([0x02, 0, 0, 0, 2, 0xfe]);
        learn(&fib, 3, "10.0.2.254", gw);
        assert_eq!(
            fib.lookup(&query("8.8.8.8", 2)),
            FibResult::Success {
                ifindex: 3,
                smac: WAN_MAC,
                dmac: gw
            }
        );
    }

    #[test]
    fn test_local_and_unrouted_not_forwarded() {
        let fib = fib();
        assert_eq!(fib.lookup(&query("10.0.2.1", 2)).code(), 4);
        assert_eq!(fib.lookup(&query("192.0.2.1", 2)).code(), 4);
        assert_eq!(fib.lookup(&query("2001:db8:9::1", 2)).code(), 4);
    }

    #[test]
    fn test_route_kinds() {
        let fib = fib();
        for (dest, kind, code) in [
            ("192.0.2.0/24", RouteKind::Blackhole, FibCode::Blackhole),
            ("198.51.100.0/24", RouteKind::Unreachable, FibCode::Unreachable),
            ("203.0.113.0/24", RouteKind::Prohibit, FibCode::Prohibit),
        ] {
            fib.add_route(Route {
                destination: dest.parse().unwrap(),
                gateway: None,
                ifindex: None,
                kind,
                source: RouteSource::Static,
            });
            let dst = dest.replace(".0/24", ".9");
            assert_eq!(fib.lookup(&query(&dst, 2)), FibResult::from(code));
        }
    }

    #[test]
    fn test_forwarding_disabled_on_ingress() {
        let fib = fib();
        fib.add_interface(FibInterface {
            ifindex: 4,
            name: "mgmt0".into(),
            mac: MacAddr([0x02, 0, 0, 0, 4, 1]),
            forwarding: false,
            addrs: vec![],
        });
        assert_eq!(
            fib.lookup(&query("10.0.2.2", 4)),
            FibResult::from(FibCode::ForwardingDisabled)
        );
    }

    #[test]
    fn test_unknown_ingress_is_error() {
        let fib = fib();
        assert!(fib.lookup(&query("10.0.2.2", 99)).code() < 0);
    }

    #[test]
    fn test_remove_interface_drops_routes() {
        let fib = fib();
        assert_eq!(fib.route_count(), 3);
        fib.remove_interface(3);
        assert_eq!(fib.route_count(), 2);
        assert_eq!(fib.lookup(&query("10.0.2.2", 2)).code(), 4);
    }
}

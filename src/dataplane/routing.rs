//! Routing table

use ipnet::IpNet;
use std::net::IpAddr;

/// What a matching route does with the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Unicast,
    Blackhole,
    Unreachable,
    Prohibit,
}

/// Source of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    /// Derived from an interface address
    Connected,
    /// Static route from config
    Static,
}

/// Route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: IpNet,
    /// Next hop (None for directly connected)
    pub gateway: Option<IpAddr>,
    /// Egress interface index; unset for non-unicast routes
    pub ifindex: Option<u32>,
    pub kind: RouteKind,
    pub source: RouteSource,
}

/// Routing table using longest prefix match over both families
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route, replacing any route with the same destination
    pub fn add(&mut self, route: Route) {
        let destination = route.destination.trunc();
        self.routes.retain(|r| r.destination.trunc() != destination);

        self.routes.push(route);

        // Longest prefix first; stable so equal prefixes keep insertion order
        self.routes
            .sort_by(|a, b| b.destination.prefix_len().cmp(&a.destination.prefix_len()));
    }

    /// Remove a route
    pub fn remove(&mut self, destination: &IpNet) -> Option<Route> {
        let destination = destination.trunc();
        let pos = self
            .routes
            .iter()
            .position(|r| r.destination.trunc() == destination)?;
        Some(self.routes.remove(pos))
    }

    /// Drops routes whose egress interface fails `keep`
    pub fn retain_interfaces(&mut self, mut keep: impl FnMut(u32) -> bool) {
        self.routes
            .retain(|r| r.ifindex.map_or(true, |ifindex| keep(ifindex)));
    }

    /// Lookup route using longest prefix match
    pub fn lookup(&self, addr: IpAddr) -> Option<&Route> {
        self.routes.iter().find(|r| r.destination.contains(&addr))
    }

    /// Get all routes
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

//! Packet processing daemon
//!
//! Binds the forwarding and snooping hooks to packet sockets. Every attached
//! interface gets a receive task that runs its frames through the hooks and
//! transmits whatever they redirect. A control loop drains learned neighbor
//! bindings, refreshes the neighbor table and dumps counters.
//!
//! [`Disposition::Pass`] and [`Disposition::Drop`] both mean "do not
//! transmit": the packet socket only sees a copy, and the kernel still
//! handles the original. Kernel IP forwarding is expected to be off.

use super::events::{EventReceiver, EventSender, NeighborBinding};
use super::forwarder::ForwardingEngine;
use super::hook::{Disposition, HookContext};
use super::neighbor_sync::NeighborSync;
use super::neighbor_table::NeighborTable;
use super::remap::InterfaceRemap;
use super::resolver::{InterfaceAddrs, NeighborResolver, Resolve};
use super::routing::Route;
use super::snooper::NeighborSnooper;
use super::static_fib::{FibInterface, StaticFib};
use super::stats::OutcomeCounters;
use crate::capture::{link, Capture};
use crate::protocol::MacAddr;
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use ipnet::IpNet;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Receive buffer per interface; large enough for offloaded super-frames
const RX_BUFFER_SIZE: usize = 65536;

/// Pause after a receive error before polling the socket again
const RX_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Learned bindings waiting for the control loop
const LEARNED_QUEUE_DEPTH: usize = 1024;

/// Floor for the pending queue sweep period
const MIN_EXPIRY_PERIOD: Duration = Duration::from_millis(100);

/// Which hooks run on frames received on an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hooks {
    pub router: bool,
    pub neighbor: bool,
}

/// Interface attached to the daemon
#[derive(Debug, Clone)]
pub struct PortConfig {
    pub name: String,
    pub ifindex: u32,
    pub mac: MacAddr,
    pub addrs: Vec<IpNet>,
    pub forwarding: bool,
    pub hooks: Hooks,
}

#[derive(Debug, Clone)]
struct Port {
    name: String,
    addrs: InterfaceAddrs,
    hooks: Hooks,
}

/// Daemon tunables, normally taken from the `[dataplane]` lock section.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub counter_shards: usize,
    pub neighbor_reachable_time: Duration,
    pub neighbor_stale_time: Duration,
    pub refresh_interval: Duration,
    /// `None` disables the periodic counter dump
    pub stats_interval: Option<Duration>,
    pub pending_per_neighbor: usize,
    pub pending_max_age: Duration,
    /// Drop state of interfaces that disappear from the kernel
    pub prune_vanished: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            counter_shards: 1,
            neighbor_reachable_time: Duration::from_secs(30),
            neighbor_stale_time: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(10),
            stats_interval: Some(Duration::from_secs(30)),
            pending_per_neighbor: 16,
            pending_max_age: Duration::from_secs(3),
            prune_vanished: true,
        }
    }
}

/// Frames to transmit, by egress ifindex
pub type Outbound = Vec<(u32, Vec<u8>)>;

/// The daemon structure integrating all components
pub struct Router {
    ports: RwLock<HashMap<u32, Port>>,
    engine: ForwardingEngine<Arc<StaticFib>>,
    snooper: NeighborSnooper,
    fib: Arc<StaticFib>,
    neighbors: Arc<RwLock<NeighborTable>>,
    remap: Arc<InterfaceRemap>,
    counters: Arc<OutcomeCounters>,
    resolver: NeighborResolver,
    metrics: Arc<MetricsRegistry>,
    settings: RouterSettings,
}

impl Router {
    /// Create a daemon publishing snooped bindings to `events`
    pub fn new(settings: RouterSettings, events: EventSender, metrics: Arc<MetricsRegistry>) -> Self {
        let neighbors = Arc::new(RwLock::new(NeighborTable::new(
            settings.neighbor_reachable_time,
            settings.neighbor_stale_time,
        )));
        let fib = Arc::new(StaticFib::new(neighbors.clone()));
        let remap = Arc::new(InterfaceRemap::new());
        let counters = Arc::new(OutcomeCounters::new(settings.counter_shards));

        Self {
            ports: RwLock::new(HashMap::new()),
            engine: ForwardingEngine::new(fib.clone(), remap.clone(), counters.clone()),
            snooper: NeighborSnooper::new(events),
            fib,
            neighbors,
            remap,
            counters,
            resolver: NeighborResolver::new(settings.pending_per_neighbor, settings.pending_max_age),
            metrics,
            settings,
        }
    }

    pub fn fib(&self) -> &Arc<StaticFib> {
        &self.fib
    }

    pub fn neighbors(&self) -> &Arc<RwLock<NeighborTable>> {
        &self.neighbors
    }

    pub fn remap(&self) -> &Arc<InterfaceRemap> {
        &self.remap
    }

    pub fn counters(&self) -> &Arc<OutcomeCounters> {
        &self.counters
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn resolver(&self) -> &NeighborResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Attach an interface: registers it with the FIB (adding its connected
    /// routes) and with the metrics registry.
    pub fn add_port(&self, port: PortConfig) {
        let ipv4 = port.addrs.iter().find_map(|net| match net.addr() {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        });
        let ipv6 = port.addrs.iter().find_map(|net| match net.addr() {
            IpAddr::V6(addr) => Some(addr),
            IpAddr::V4(_) => None,
        });

        self.metrics.register_interface(&port.name);
        self.fib.add_interface(FibInterface {
            ifindex: port.ifindex,
            name: port.name.clone(),
            mac: port.mac,
            forwarding: port.forwarding,
            addrs: port.addrs,
        });

        debug!(interface = %port.name, ifindex = port.ifindex, hooks = ?port.hooks, "port attached");
        self.ports.write().unwrap_or_else(|e| e.into_inner()).insert(
            port.ifindex,
            Port {
                name: port.name,
                addrs: InterfaceAddrs {
                    ifindex: port.ifindex,
                    mac: port.mac,
                    ipv4,
                    ipv6,
                },
                hooks: port.hooks,
            },
        );
    }

    pub fn add_route(&self, route: Route) {
        self.fib.add_route(route);
    }

    /// Add a neighbor entry that never ages out
    pub fn add_neighbor(&self, ifindex: u32, ip: IpAddr, mac: MacAddr) {
        self.neighbors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert_permanent(ifindex, ip, mac);
    }

    /// FIB lookups for packets arriving on `ingress` use `lookup` instead.
    ///
    /// `lookup` must be an attached port: the FIB knows nothing about other
    /// interfaces and would answer every query with an error. A self
    /// reference is a no-op.
    pub fn set_lookup_via(&self, ingress: u32, lookup: u32) -> Result<()> {
        if ingress == lookup {
            return Ok(());
        }
        if !self.has_port(lookup) {
            return Err(Error::InterfaceNotFound {
                name: format!("ifindex {}", lookup),
            });
        }
        self.remap.insert(ingress, lookup)
    }

    pub fn has_port(&self, ifindex: u32) -> bool {
        self.ports
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&ifindex)
    }

    fn port_name(&self, ifindex: u32) -> Option<String> {
        self.ports
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&ifindex)
            .map(|p| p.name.clone())
    }

    fn port_addrs(&self, ifindex: u32) -> Option<InterfaceAddrs> {
        self.ports
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&ifindex)
            .map(|p| p.addrs)
    }

    /// Runs one received frame through the hooks attached to `ifindex`.
    ///
    /// The neighbor hook sees the frame before the router hook rewrites it.
    pub fn process_frame(&self, ifindex: u32, shard: usize, frame: &mut [u8]) -> Outbound {
        let hooks = match self
            .ports
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&ifindex)
        {
            Some(port) => port.hooks,
            None => return Vec::new(),
        };
        let ctx = HookContext { ifindex, shard };

        if hooks.neighbor {
            self.snooper.observe(&ctx, frame);
        }
        if !hooks.router {
            return Vec::new();
        }

        match self.engine.process(&ctx, frame) {
            Disposition::Pass | Disposition::Drop => Vec::new(),
            Disposition::Redirect { ifindex: egress } => {
                self.metrics.packets_redirected.inc();
                vec![(egress, frame.to_vec())]
            }
            Disposition::RedirectNeighbor {
                ifindex: egress,
                nexthop,
            } => {
                let Some(addrs) = self.port_addrs(egress) else {
                    debug!(egress, nexthop = %nexthop.addr, "next hop behind unattached interface");
                    return Vec::new();
                };
                match self.resolver.resolve(&addrs, nexthop, frame) {
                    Resolve::Solicit(solicitation) => {
                        self.metrics.solicitations_sent.inc();
                        debug!(egress, nexthop = %nexthop.addr, "soliciting next hop");
                        vec![(egress, solicitation)]
                    }
                    Resolve::Queued => Vec::new(),
                    Resolve::QueueFull => {
                        self.metrics.pending_dropped.inc();
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Releases packets that were waiting for `binding`.
    pub fn learn(&self, binding: &NeighborBinding) -> Outbound {
        self.metrics.neighbors_learned.inc();

        let Some(addrs) = self.port_addrs(binding.ifindex) else {
            return Vec::new();
        };
        let released =
            self.resolver
                .release(binding.ifindex, &binding.ip_addr(), binding.mac, addrs.mac);
        if !released.is_empty() {
            debug!(
                ifindex = binding.ifindex,
                ip = %binding.ip_addr(),
                count = released.len(),
                "releasing pending packets"
            );
        }
        self.metrics.pending_released.add(released.len() as u64);

        released
            .into_iter()
            .map(|frame| (binding.ifindex, frame))
            .collect()
    }

    /// Ages the neighbor table and pending queue. Returns solicitations for
    /// entries that went stale.
    pub fn refresh(&self) -> Outbound {
        let stale = {
            let mut neighbors = self.neighbors.write().unwrap_or_else(|e| e.into_inner());
            neighbors.refresh_states();
            self.metrics.set_neighbor_table_size(neighbors.len());
            neighbors.get_stale_entries()
        };

        let mut out = Vec::new();
        {
            let ports = self.ports.read().unwrap_or_else(|e| e.into_inner());
            for (ifindex, ip) in stale {
                if let Some(port) = ports.get(&ifindex) {
                    out.push((ifindex, NeighborResolver::solicitation(&port.addrs, ip)));
                }
            }
        }
        self.metrics.solicitations_sent.add(out.len() as u64);

        self.expire_pending();

        self.metrics.set_route_count(self.fib.route_count());
        self.metrics.set_remap_entries(self.remap.len());
        self.metrics.set_events_dropped(self.snooper.events().dropped());

        out
    }

    /// Drops parked packets older than the pending maximum age.
    pub fn expire_pending(&self) -> usize {
        let expired = self.resolver.expire();
        if expired > 0 {
            debug!(expired, "pending packets aged out");
        }
        self.metrics.pending_expired.add(expired as u64);
        expired
    }

    /// Detaches interfaces for which `exists` is false and forgets every
    /// route, neighbor, remap entry and pending packet tied to them.
    /// Returns the names of the detached interfaces.
    pub fn prune_interfaces(&self, exists: impl Fn(u32) -> bool) -> Vec<String> {
        self.remap.retain(&exists);

        let vanished: Vec<(u32, String)> = {
            let mut ports = self.ports.write().unwrap_or_else(|e| e.into_inner());
            let gone: Vec<u32> = ports.keys().copied().filter(|idx| !exists(*idx)).collect();
            gone.into_iter()
                .filter_map(|idx| ports.remove(&idx).map(|p| (idx, p.name)))
                .collect()
        };
        if vanished.is_empty() {
            return Vec::new();
        }

        let gone: HashSet<u32> = vanished.iter().map(|(idx, _)| *idx).collect();
        self.neighbors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain_interfaces(|idx| !gone.contains(&idx));
        self.resolver.forget_interfaces(|idx| !gone.contains(&idx));

        vanished
            .into_iter()
            .map(|(ifindex, name)| {
                self.fib.remove_interface(ifindex);
                self.metrics.unregister_interface(&name);
                info!(interface = %name, ifindex, "interface vanished, state removed");
                name
            })
            .collect()
    }

    /// Hook counters followed by daemon metrics
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut stats = self.counters.snapshot().export();
        stats.extend(self.metrics.export());
        stats
    }

    fn log_stats(&self) {
        for (name, value) in self.export() {
            if value > 0 {
                info!(counter = %name, value, "stats");
            }
        }
    }

    /// Runs the daemon until `shutdown` completes.
    ///
    /// `sockets` maps each attached ifindex to its packet socket; `events` is
    /// the consumer half of the channel the snooper publishes to.
    pub async fn run<S, F>(
        self: Arc<Self>,
        sockets: HashMap<u32, Arc<S>>,
        events: EventReceiver,
        shutdown: F,
    ) -> Result<()>
    where
        S: Capture + 'static,
        F: Future<Output = ()>,
    {
        if sockets.is_empty() {
            return Err(Error::Config("no interfaces configured".to_string()));
        }
        let sockets = Arc::new(sockets);

        let (learned_tx, mut learned_rx) = mpsc::channel(LEARNED_QUEUE_DEPTH);
        let sync = tokio::spawn(
            NeighborSync::new(self.neighbors.clone())
                .with_metrics(self.metrics.clone())
                .run(events, learned_tx),
        );

        let mut indices: Vec<u32> = sockets.keys().copied().collect();
        indices.sort_unstable();
        let workers: Vec<_> = indices
            .into_iter()
            .enumerate()
            .map(|(i, ifindex)| {
                let shard = i % self.counters.shard_count();
                tokio::spawn(self.clone().serve_port(ifindex, shard, sockets.clone()))
            })
            .collect();

        let mut refresh = interval(self.settings.refresh_interval);
        let mut expiry = interval(
            self.settings
                .pending_max_age
                .clamp(MIN_EXPIRY_PERIOD, self.settings.refresh_interval.max(MIN_EXPIRY_PERIOD)),
        );
        let stats_period = self.settings.stats_interval;
        let mut stats = interval(stats_period.unwrap_or(Duration::from_secs(3600)));
        tokio::pin!(shutdown);

        info!(interfaces = workers.len(), "dataplane started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    break;
                }
                Some(binding) = learned_rx.recv() => {
                    let out = self.learn(&binding);
                    self.transmit(&sockets, out).await;
                }
                _ = refresh.tick() => {
                    if self.settings.prune_vanished {
                        self.prune_interfaces(link::interface_exists);
                    }
                    let out = self.refresh();
                    self.transmit(&sockets, out).await;
                }
                _ = expiry.tick() => {
                    self.expire_pending();
                }
                _ = stats.tick(), if stats_period.is_some() => {
                    self.log_stats();
                }
            }
        }

        for worker in workers {
            worker.abort();
        }
        sync.abort();
        Ok(())
    }

    async fn serve_port<S: Capture>(
        self: Arc<Self>,
        ifindex: u32,
        shard: usize,
        sockets: Arc<HashMap<u32, Arc<S>>>,
    ) {
        let Some(socket) = sockets.get(&ifindex).cloned() else {
            return;
        };
        let name = self
            .port_name(ifindex)
            .unwrap_or_else(|| ifindex.to_string());
        let mut buf = vec![0u8; RX_BUFFER_SIZE];
        debug!(interface = %name, ifindex, shard, "receive loop started");

        loop {
            match socket.recv(&mut buf).await {
                Ok(rx) if rx.outgoing => {
                    self.metrics.record_outgoing(&name);
                }
                Ok(rx) => {
                    let len = rx.len.min(buf.len());
                    self.metrics.record_rx(&name, len);
                    let out = self.process_frame(ifindex, shard, &mut buf[..len]);
                    self.transmit(&sockets, out).await;
                }
                Err(e) => {
                    self.metrics.record_rx_error(&name);
                    if !self.has_port(ifindex) {
                        debug!(interface = %name, "interface detached, receive loop stopped");
                        return;
                    }
                    warn!(interface = %name, "receive error: {}", e);
                    tokio::time::sleep(RX_ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn transmit<S: Capture>(&self, sockets: &HashMap<u32, Arc<S>>, frames: Outbound) {
        for (ifindex, frame) in frames {
            let name = self.port_name(ifindex).unwrap_or_default();
            let Some(socket) = sockets.get(&ifindex) else {
                debug!(ifindex, "no socket for egress interface, frame dropped");
                continue;
            };
            match socket.send(&frame).await {
                Ok(n) => self.metrics.record_tx(&name, n),
                Err(e) => {
                    self.metrics.record_tx_error(&name);
                    warn!(interface = %name, "send failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataplane::events::event_channel;
    use crate::dataplane::neighbor_table::NeighborState;
    use crate::dataplane::routing::{RouteKind, RouteSource};
    use crate::dataplane::stats::Outcome;

    const LAN_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 1, 1]);
    const WAN_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 2, 1]);
    const SERVER_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 2, 2]);

    fn router_with(settings: RouterSettings) -> (Router, EventReceiver) {
        let (tx, rx) = event_channel(64);
        let router = Router::new(settings, tx, Arc::new(MetricsRegistry::new()));
        let both = Hooks {
            router: true,
            neighbor: true,
        };
        router.add_port(PortConfig {
            name: "eth1".into(),
            ifindex: 2,
            mac: LAN_MAC,
            addrs: vec!["10.0.1.1/24".parse().unwrap()],
            forwarding: true,
            hooks: both,
        });
        router.add_port(PortConfig {
            name: "eth2".into(),
            ifindex: 3,
            mac: WAN_MAC,
            addrs: vec!["10.0.2.1/24".parse().unwrap()],
            forwarding: true,
            hooks: both,
        });
        (router, rx)
    }

    fn router() -> (Router, EventReceiver) {
        router_with(RouterSettings::default())
    }

    fn ipv4_frame(dst: [u8; 4]) -> Vec<u8> {
        let mut f = vec![0u8; 14 + 20];
        f[0..6].copy_from_slice(&LAN_MAC.0);
        f[6..12].copy_from_slice(&[0x02, 0, 0, 0, 1, 2]);
        f[12..14].copy_from_slice(&[0x08, 0x00]);
        f[14] = 0x45;
        f[22] = 64;
        f[23] = 17;
        f[26..30].copy_from_slice(&[10, 0, 1, 2]);
        f[30..34].copy_from_slice(&dst);
        f
    }

    fn arp_reply(sha: MacAddr, spa: [u8; 4]) -> Vec<u8> {
        let mut f = WAN_MAC.0.to_vec();
        f.extend_from_slice(&sha.0);
        f.extend_from_slice(&[0x08, 0x06, 0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x02]);
        f.extend_from_slice(&sha.0);
        f.extend_from_slice(&spa);
        f.extend_from_slice(&WAN_MAC.0);
        f.extend_from_slice(&[10, 0, 2, 1]);
        f
    }

    #[test]
    fn test_forward_to_known_neighbor() {
        let (router, _rx) = router();
        router.add_neighbor(3, "10.0.2.2".parse().unwrap(), SERVER_MAC);

        let mut frame = ipv4_frame([10, 0, 2, 2]);
        let out = router.process_frame(2, 0, &mut frame);

        assert_eq!(out.len(), 1);
        let (egress, pkt) = &out[0];
        assert_eq!(*egress, 3);
        assert_eq!(&pkt[0..6], &SERVER_MAC.0);
        assert_eq!(&pkt[6..12], &WAN_MAC.0);
        assert_eq!(router.metrics().packets_redirected.get(), 1);
        assert_eq!(router.counters().snapshot().outcome(Outcome::Route).packets, 1);
    }

    #[test]
    fn test_unknown_neighbor_solicits_then_releases() {
        let (router, mut rx) = router();

        let mut frame = ipv4_frame([10, 0, 2, 2]);
        let out = router.process_frame(2, 0, &mut frame);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, 3);
        assert_eq!(&out[0].1[12..14], &[0x08, 0x06]);

        // Second packet rides behind the outstanding request
        let mut frame = ipv4_frame([10, 0, 2, 2]);
        assert!(router.process_frame(2, 0, &mut frame).is_empty());

        // Reply arrives on the egress interface
        let mut reply = arp_reply(SERVER_MAC, [10, 0, 2, 2]);
        assert!(router.process_frame(3, 0, &mut reply).is_empty());
        let record = rx.try_recv().unwrap();
        let binding = NeighborSync::new(router.neighbors().clone())
            .apply(&record)
            .unwrap();

        let released = router.learn(&binding);
        assert_eq!(released.len(), 2);
        for (egress, pkt) in &released {
            assert_eq!(*egress, 3);
            assert_eq!(&pkt[0..6], &SERVER_MAC.0);
            assert_eq!(&pkt[6..12], &WAN_MAC.0);
        }
        assert_eq!(router.metrics().pending_released.get(), 2);

        // Later packets go straight out
        let mut frame = ipv4_frame([10, 0, 2, 2]);
        assert_eq!(router.process_frame(2, 0, &mut frame).len(), 1);
    }

    #[test]
    fn test_hooks_respected() {
        let (tx, mut rx) = event_channel(8);
        let router = Router::new(RouterSettings::default(), tx, Arc::new(MetricsRegistry::new()));
        router.add_port(PortConfig {
            name: "eth2".into(),
            ifindex: 3,
            mac: WAN_MAC,
            addrs: vec!["10.0.2.1/24".parse().unwrap()],
            forwarding: true,
            hooks: Hooks {
                router: false,
                neighbor: true,
            },
        });
        router.add_neighbor(3, "10.0.2.2".parse().unwrap(), SERVER_MAC);

        let mut frame = ipv4_frame([10, 0, 2, 2]);
        assert!(router.process_frame(3, 0, &mut frame).is_empty());
        assert_eq!(router.counters().snapshot().outcome(Outcome::Route).packets, 0);

        let mut reply = arp_reply(SERVER_MAC, [10, 0, 2, 2]);
        router.process_frame(3, 0, &mut reply);
        assert!(rx.try_recv().is_some());

        // Unattached interface
        assert!(router.process_frame(9, 0, &mut frame).is_empty());
    }

    #[test]
    fn test_blackhole_is_not_transmitted() {
        let (router, _rx) = router();
        router.add_route(Route {
            destination: "192.0.2.0/24".parse().unwrap(),
            gateway: None,
            ifindex: None,
            kind: RouteKind::Blackhole,
            source: RouteSource::Static,
        });

        let mut frame = ipv4_frame([192, 0, 2, 1]);
        assert!(router.process_frame(2, 0, &mut frame).is_empty());
        assert_eq!(router.counters().snapshot().outcome(Outcome::LastExit).packets, 1);
    }

    #[test]
    fn test_refresh_solicits_stale() {
        let (router, _rx) = router_with(RouterSettings {
            neighbor_reachable_time: Duration::ZERO,
            ..Default::default()
        });
        router
            .neighbors()
            .write()
            .unwrap()
            .insert(3, "10.0.2.2".parse().unwrap(), SERVER_MAC);

        let out = router.refresh();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, 3);
        assert_eq!(&out[0].1[0..6], &[0xff; 6]);
        assert_eq!(
            router
                .neighbors()
                .read()
                .unwrap()
                .lookup(3, &"10.0.2.2".parse().unwrap())
                .unwrap()
                .1,
            NeighborState::Stale
        );
        assert_eq!(router.metrics().solicitations_sent.get(), 1);
    }

    #[test]
    fn test_prune_vanished_interface() {
        let (router, _rx) = router();
        router.set_lookup_via(7, 3).unwrap();
        router.add_neighbor(3, "10.0.2.2".parse().unwrap(), SERVER_MAC);
        router.add_neighbor(2, "10.0.1.2".parse().unwrap(), LAN_MAC);

        let removed = router.prune_interfaces(|idx| idx != 3);
        assert_eq!(removed, vec!["eth2".to_string()]);
        assert!(!router.has_port(3));
        assert!(router.remap().is_empty());
        assert_eq!(router.neighbors().read().unwrap().len(), 1);
        assert_eq!(router.fib().route_count(), 1);

        assert!(router.prune_interfaces(|_| true).is_empty());
    }

    #[test]
    fn test_lookup_via_requires_attached_port() {
        let (router, _rx) = router();
        router.add_neighbor(3, "10.0.2.2".parse().unwrap(), SERVER_MAC);

        assert!(router.set_lookup_via(2, 50).is_err());
        assert!(router.remap().is_empty());
        assert!(router.set_lookup_via(2, 2).is_ok());
        assert!(router.remap().is_empty());

        let mut frame = ipv4_frame([10, 0, 2, 2]);
        let out = router.process_frame(2, 0, &mut frame);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, 3);
        assert_eq!(router.counters().snapshot().outcome(Outcome::NotForwarded).packets, 0);
    }

    #[test]
    fn test_lookup_via_uses_target_port_settings() {
        let (router, _rx) = router();
        router.add_port(PortConfig {
            name: "br100".into(),
            ifindex: 4,
            mac: MacAddr([0x02, 0, 0, 0, 4, 1]),
            addrs: vec![],
            forwarding: false,
            hooks: Hooks::default(),
        });
        router.add_neighbor(3, "10.0.2.2".parse().unwrap(), SERVER_MAC);
        router.set_lookup_via(2, 4).unwrap();

        // Ingress 2 now inherits br100's disabled forwarding
        let mut frame = ipv4_frame([10, 0, 2, 2]);
        assert!(router.process_frame(2, 0, &mut frame).is_empty());
        assert_eq!(router.counters().snapshot().outcome(Outcome::LastExit).packets, 1);
    }

    #[test]
    fn test_aged_pending_packets_not_released() {
        let (router, _rx) = router_with(RouterSettings {
            pending_max_age: Duration::ZERO,
            ..Default::default()
        });

        let mut frame = ipv4_frame([10, 0, 2, 2]);
        assert_eq!(router.process_frame(2, 0, &mut frame).len(), 1);

        let binding = NeighborBinding::ipv4(3, SERVER_MAC, [10, 0, 2, 2]);
        assert!(router.learn(&binding).is_empty());
        assert_eq!(router.expire_pending(), 1);
        assert_eq!(router.metrics().pending_expired.get(), 1);
        assert_eq!(router.metrics().pending_released.get(), 0);
    }

    #[test]
    fn test_export_includes_hook_counters() {
        let (router, _rx) = router();
        let names: Vec<String> = router.export().into_iter().map(|(k, _)| k).collect();
        assert!(names.contains(&"return_reasons_packets{key=route}".to_string()));
        assert!(names.contains(&"fib_lookup_packets{key=no_neigh}".to_string()));
        assert!(names.contains(&"eth1_rx_packets".to_string()));
    }
}

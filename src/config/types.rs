//! Configuration types

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Hook names accepted in `interfaces.<name>.hooks`
pub const HOOK_ROUTER: &str = "router";
pub const HOOK_NEIGHBOR: &str = "neighbor";

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FORMAT: &str = "pretty";
pub const DEFAULT_EVENT_CAPACITY: usize = 65536;
pub const DEFAULT_STATS_INTERVAL: u64 = 30;
pub const DEFAULT_NEIGHBOR_REACHABLE_TIME: u64 = 30;
pub const DEFAULT_NEIGHBOR_STALE_TIME: u64 = 300;
pub const DEFAULT_NEIGHBOR_REFRESH_INTERVAL: u64 = 10;
pub const DEFAULT_PENDING_PER_NEIGHBOR: usize = 16;
pub const DEFAULT_PENDING_MAX_AGE: u64 = 3;

/// User-defined configuration (config.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub dataplane: Option<DataplaneConfig>,
    #[serde(default)]
    pub interfaces: BTreeMap<String, InterfaceConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub neighbors: Vec<NeighborConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataplaneConfig {
    pub event_capacity: Option<usize>,
    /// 0 selects one shard per available CPU
    pub counter_shards: Option<usize>,
    /// Seconds between counter dumps; 0 disables
    pub stats_interval: Option<u64>,
    pub neighbor_reachable_time: Option<u64>,
    pub neighbor_stale_time: Option<u64>,
    pub neighbor_refresh_interval: Option<u64>,
    pub pending_per_neighbor: Option<usize>,
    pub pending_max_age: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceConfig {
    /// IPv4 address in CIDR form
    pub address: Option<String>,
    /// IPv6 address in CIDR form
    pub address6: Option<String>,
    pub hooks: Option<Vec<String>>,
    pub forwarding: Option<bool>,
    /// Interface whose index is used for FIB lookups of packets arriving here
    pub lookup_via: Option<String>,
    /// Override the kernel's MAC address
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    #[default]
    Unicast,
    Blackhole,
    Unreachable,
    Prohibit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub destination: String,
    pub gateway: Option<String>,
    pub interface: Option<String>,
    #[serde(default)]
    pub kind: RouteType,
}

/// Permanent neighbor entry
#[derive(Debug, Clone, Deserialize)]
pub struct NeighborConfig {
    pub interface: String,
    pub address: String,
    pub mac: String,
}

// ============================================================================
// Lock file types (generated, includes all defaults)
// ============================================================================

/// Generated lock file with all defaults filled in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLock {
    pub generated_at: String,
    pub logging: LoggingLock,
    pub dataplane: DataplaneLock,
    pub interfaces: BTreeMap<String, InterfaceLock>,
    #[serde(default)]
    pub routes: Vec<RouteLock>,
    #[serde(default)]
    pub neighbors: Vec<NeighborLock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingLock {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataplaneLock {
    pub event_capacity: usize,
    pub counter_shards: usize,
    pub stats_interval: u64,
    pub neighbor_reachable_time: u64,
    pub neighbor_stale_time: u64,
    pub neighbor_refresh_interval: u64,
    pub pending_per_neighbor: usize,
    pub pending_max_age: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceLock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address6: Option<String>,
    pub hooks: Vec<String>,
    pub forwarding: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_via: Option<String>,
    /// "auto" reads the address from the kernel
    pub mac: String,
}

impl InterfaceLock {
    pub fn has_hook(&self, hook: &str) -> bool {
        self.hooks.iter().any(|h| h == hook)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLock {
    pub destination: String,
    /// Next hop address, or "direct" for connected routes
    pub gateway: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub kind: RouteType,
    /// "auto" for routes derived from interface addresses, "config" otherwise
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborLock {
    pub interface: String,
    pub address: String,
    pub mac: String,
}

/// Parses a CIDR string, accepting a bare address as a host route.
pub fn parse_prefix(s: &str) -> Option<IpNet> {
    if let Ok(net) = s.parse::<IpNet>() {
        return Some(net);
    }
    s.parse::<IpAddr>().ok().map(IpNet::from)
}

impl ConfigLock {
    pub fn from_config(config: &Config) -> Self {
        let logging = config.logging.clone().unwrap_or_default();
        let dataplane = config.dataplane.clone().unwrap_or_default();

        let interfaces = config
            .interfaces
            .iter()
            .map(|(name, iface)| {
                (
                    name.clone(),
                    InterfaceLock {
                        address: iface.address.clone(),
                        address6: iface.address6.clone(),
                        hooks: iface
                            .hooks
                            .clone()
                            .unwrap_or_else(|| {
                                vec![HOOK_ROUTER.to_string(), HOOK_NEIGHBOR.to_string()]
                            }),
                        forwarding: iface.forwarding.unwrap_or(true),
                        lookup_via: iface.lookup_via.clone(),
                        mac: iface.mac.clone().unwrap_or_else(|| "auto".to_string()),
                    },
                )
            })
            .collect();

        // Connected routes first, then configured routes in file order
        let mut routes: Vec<RouteLock> = Vec::new();
        for (name, iface) in &config.interfaces {
            for addr in [&iface.address, &iface.address6].into_iter().flatten() {
                if let Ok(net) = addr.parse::<IpNet>() {
                    routes.push(RouteLock {
                        destination: net.trunc().to_string(),
                        gateway: "direct".to_string(),
                        interface: Some(name.clone()),
                        kind: RouteType::Unicast,
                        source: "auto".to_string(),
                    });
                }
            }
        }
        routes.extend(config.routes.iter().map(|r| RouteLock {
            destination: parse_prefix(&r.destination)
                .map(|net| net.trunc().to_string())
                .unwrap_or_else(|| r.destination.clone()),
            gateway: r.gateway.clone().unwrap_or_else(|| "direct".to_string()),
            interface: r.interface.clone(),
            kind: r.kind,
            source: "config".to_string(),
        }));

        let neighbors = config
            .neighbors
            .iter()
            .map(|n| NeighborLock {
                interface: n.interface.clone(),
                address: n.address.clone(),
                mac: n.mac.to_lowercase(),
            })
            .collect();

        ConfigLock {
            generated_at: chrono::Utc::now().to_rfc3339(),
            logging: LoggingLock {
                level: logging
                    .level
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
                format: logging
                    .format
                    .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string()),
            },
            dataplane: DataplaneLock {
                event_capacity: dataplane.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY),
                counter_shards: dataplane.counter_shards.unwrap_or(0),
                stats_interval: dataplane.stats_interval.unwrap_or(DEFAULT_STATS_INTERVAL),
                neighbor_reachable_time: dataplane
                    .neighbor_reachable_time
                    .unwrap_or(DEFAULT_NEIGHBOR_REACHABLE_TIME),
                neighbor_stale_time: dataplane
                    .neighbor_stale_time
                    .unwrap_or(DEFAULT_NEIGHBOR_STALE_TIME),
                neighbor_refresh_interval: dataplane
                    .neighbor_refresh_interval
                    .unwrap_or(DEFAULT_NEIGHBOR_REFRESH_INTERVAL),
                pending_per_neighbor: dataplane
                    .pending_per_neighbor
                    .unwrap_or(DEFAULT_PENDING_PER_NEIGHBOR),
                pending_max_age: dataplane.pending_max_age.unwrap_or(DEFAULT_PENDING_MAX_AGE),
            },
            interfaces,
            routes,
            neighbors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[logging]
level = "debug"

[dataplane]
event_capacity = 1024

[interfaces.eth1]
address = "10.0.1.1/24"
address6 = "2001:db8:1::1/64"
hooks = ["router"]

[interfaces.vxlan100]
lookup_via = "br100"

[[routes]]
destination = "0.0.0.0/0"
gateway = "10.0.1.254"
interface = "eth1"

[[routes]]
destination = "192.0.2.7"
kind = "blackhole"

[[neighbors]]
interface = "eth1"
address = "10.0.1.254"
mac = "02:00:00:00:01:FE"
"#;

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.interfaces.len(), 2);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].kind, RouteType::Unicast);
        assert_eq!(config.routes[1].kind, RouteType::Blackhole);
        assert_eq!(config.neighbors[0].address, "10.0.1.254");
    }

    #[test]
    fn test_lock_fills_defaults() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let lock = ConfigLock::from_config(&config);

        assert_eq!(lock.logging.level, "debug");
        assert_eq!(lock.logging.format, "pretty");
        assert_eq!(lock.dataplane.event_capacity, 1024);
        assert_eq!(lock.dataplane.neighbor_refresh_interval, 10);
        assert_eq!(lock.dataplane.pending_max_age, 3);

        let vx = &lock.interfaces["vxlan100"];
        assert_eq!(vx.hooks, vec!["router".to_string(), "neighbor".to_string()]);
        assert!(vx.forwarding);
        assert_eq!(vx.mac, "auto");
        assert!(!lock.interfaces["eth1"].has_hook(HOOK_NEIGHBOR));

        assert_eq!(lock.neighbors[0].mac, "02:00:00:00:01:fe");
    }

    #[test]
    fn test_lock_routes() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let lock = ConfigLock::from_config(&config);

        let dests: Vec<(&str, &str)> = lock
            .routes
            .iter()
            .map(|r| (r.destination.as_str(), r.source.as_str()))
            .collect();
        assert_eq!(
            dests,
            vec![
                ("10.0.1.0/24", "auto"),
                ("2001:db8:1::/64", "auto"),
                ("0.0.0.0/0", "config"),
                ("192.0.2.7/32", "config"),
            ]
        );
        assert_eq!(lock.routes[0].gateway, "direct");
        assert_eq!(lock.routes[3].kind, RouteType::Blackhole);
    }

    #[test]
    fn test_lock_roundtrips_through_toml() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let lock = ConfigLock::from_config(&config);

        let text = toml::to_string_pretty(&lock).unwrap();
        let back: ConfigLock = toml::from_str(&text).unwrap();
        assert_eq!(back.interfaces, lock.interfaces);
        assert_eq!(back.routes, lock.routes);
        assert_eq!(back.dataplane, lock.dataplane);
    }

    #[test]
    fn test_parse_prefix() {
        assert_eq!(
            parse_prefix("10.0.0.0/8").unwrap().to_string(),
            "10.0.0.0/8"
        );
        assert_eq!(parse_prefix("2001:db8::1").unwrap().prefix_len(), 128);
        assert!(parse_prefix("10.0.0.0/33").is_none());
        assert!(parse_prefix("nope").is_none());
    }
}

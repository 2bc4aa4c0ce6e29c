//! Configuration validation

use super::{parse_prefix, Config, RouteType, HOOK_NEIGHBOR, HOOK_ROUTER};
use crate::dataplane::REMAP_CAPACITY;
use crate::protocol::MacAddr;
use ipnet::IpNet;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_logging(config, &mut result);
    validate_dataplane(config, &mut result);
    validate_interfaces(config, &mut result);
    validate_routes(config, &mut result);
    validate_neighbors(config, &mut result);

    result
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    let Some(logging) = &config.logging else {
        return;
    };
    if let Some(level) = &logging.level {
        if !["error", "warn", "info", "debug", "trace"].contains(&level.to_lowercase().as_str()) {
            result.warn(format!("logging.level: unknown level '{}', using info", level));
        }
    }
    if let Some(format) = &logging.format {
        if !["pretty", "compact", "json"].contains(&format.as_str()) {
            result.warn(format!(
                "logging.format: unknown format '{}', using pretty",
                format
            ));
        }
    }
}

fn validate_dataplane(config: &Config, result: &mut ValidationResult) {
    let Some(dp) = &config.dataplane else {
        return;
    };

    if dp.event_capacity == Some(0) {
        result.error("dataplane.event_capacity: must be greater than 0");
    }
    if dp.pending_per_neighbor == Some(0) {
        result.warn("dataplane.pending_per_neighbor: 0 drops every packet awaiting a neighbor");
    }
    if dp.neighbor_refresh_interval == Some(0) {
        result.error("dataplane.neighbor_refresh_interval: must be greater than 0");
    }

    let reachable = dp.neighbor_reachable_time.unwrap_or(super::DEFAULT_NEIGHBOR_REACHABLE_TIME);
    let stale = dp.neighbor_stale_time.unwrap_or(super::DEFAULT_NEIGHBOR_STALE_TIME);
    if stale < reachable {
        result.warn(format!(
            "dataplane.neighbor_stale_time ({}) is shorter than neighbor_reachable_time ({}); entries expire before going stale",
            stale, reachable
        ));
    }
}

fn validate_interfaces(config: &Config, result: &mut ValidationResult) {
    let mut remap_entries = 0;

    for (name, iface) in &config.interfaces {
        if let Some(addr) = &iface.address {
            match addr.parse::<IpNet>() {
                Ok(IpNet::V4(_)) => {}
                Ok(IpNet::V6(_)) => result.error(format!(
                    "interfaces.{}: address '{}' is IPv6, use address6",
                    name, addr
                )),
                Err(_) => result.error(format!(
                    "interfaces.{}: invalid address '{}' (expected CIDR)",
                    name, addr
                )),
            }
        }
        if let Some(addr) = &iface.address6 {
            match addr.parse::<IpNet>() {
                Ok(IpNet::V6(_)) => {}
                Ok(IpNet::V4(_)) => result.error(format!(
                    "interfaces.{}: address6 '{}' is IPv4, use address",
                    name, addr
                )),
                Err(_) => result.error(format!(
                    "interfaces.{}: invalid address6 '{}' (expected CIDR)",
                    name, addr
                )),
            }
        }

        match &iface.hooks {
            Some(hooks) if hooks.is_empty() => {
                result.warn(format!(
                    "interfaces.{}: no hooks attached, packets are only transmitted",
                    name
                ));
            }
            Some(hooks) => {
                for hook in hooks {
                    if hook != HOOK_ROUTER && hook != HOOK_NEIGHBOR {
                        result.error(format!("interfaces.{}: unknown hook '{}'", name, hook));
                    }
                }
                if !hooks.iter().any(|h| h == HOOK_NEIGHBOR) {
                    result.warn(format!(
                        "interfaces.{}: neighbor hook not attached, next hops behind it are only known from [[neighbors]]",
                        name
                    ));
                }
            }
            None => {}
        }

        if let Some(mac) = &iface.mac {
            if mac != "auto" && mac.parse::<MacAddr>().is_err() {
                result.error(format!("interfaces.{}: invalid mac '{}'", name, mac));
            }
        }

        if let Some(via) = &iface.lookup_via {
            remap_entries += 1;
            if via == name {
                result.warn(format!(
                    "interfaces.{}: lookup_via refers to itself, ignored",
                    name
                ));
            } else if !config.interfaces.contains_key(via) {
                // Lookups would run against an interface the FIB never learns
                result.error(format!(
                    "interfaces.{}: lookup_via '{}' is not a configured interface",
                    name, via
                ));
            }
        }
    }

    if remap_entries > REMAP_CAPACITY {
        result.error(format!(
            "interfaces: {} lookup_via entries exceed the remap table capacity of {}",
            remap_entries, REMAP_CAPACITY
        ));
    }
}

fn validate_routes(config: &Config, result: &mut ValidationResult) {
    for (i, route) in config.routes.iter().enumerate() {
        // Check interface reference if specified
        if let Some(ref iface) = route.interface {
            if !config.interfaces.contains_key(iface) {
                result.error(format!("routes[{}]: interface '{}' not defined", i, iface));
            }
        }

        let destination = match route.destination.parse::<IpNet>() {
            Ok(net) => Some(net),
            Err(_) => match parse_prefix(&route.destination) {
                Some(net) => {
                    result.warn(format!(
                        "routes[{}]: destination '{}' missing prefix length, using /{}",
                        i,
                        route.destination,
                        net.prefix_len()
                    ));
                    Some(net)
                }
                None => {
                    result.error(format!(
                        "routes[{}]: invalid destination '{}'",
                        i, route.destination
                    ));
                    None
                }
            },
        };

        let gateway = match &route.gateway {
            Some(gw) => match gw.parse::<IpAddr>() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    result.error(format!("routes[{}]: invalid gateway '{}'", i, gw));
                    None
                }
            },
            None => None,
        };

        if let (Some(dest), Some(gw)) = (destination, gateway) {
            if dest.addr().is_ipv4() != gw.is_ipv4() {
                result.error(format!(
                    "routes[{}]: gateway {} and destination {} are different families",
                    i, gw, dest
                ));
            }
        }

        match route.kind {
            RouteType::Unicast if route.interface.is_none() => {
                result.error(format!("routes[{}]: unicast route requires interface", i));
            }
            RouteType::Unicast => {}
            kind => {
                if route.gateway.is_some() || route.interface.is_some() {
                    result.warn(format!(
                        "routes[{}]: gateway and interface are ignored for {:?} routes",
                        i, kind
                    ));
                }
            }
        }
    }
}

fn validate_neighbors(config: &Config, result: &mut ValidationResult) {
    for (i, neigh) in config.neighbors.iter().enumerate() {
        if !config.interfaces.contains_key(&neigh.interface) {
            result.error(format!(
                "neighbors[{}]: interface '{}' not defined",
                i, neigh.interface
            ));
        }
        if neigh.address.parse::<IpAddr>().is_err() {
            result.error(format!(
                "neighbors[{}]: invalid address '{}'",
                i, neigh.address
            ));
        }
        if neigh.mac.parse::<MacAddr>().is_err() {
            result.error(format!("neighbors[{}]: invalid mac '{}'", i, neigh.mac));
        }
    }
}

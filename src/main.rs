use clap::{Parser, Subcommand};
use fibhook::config::{self, ConfigLock, DataplaneLock, RouteLock, RouteType};
use fibhook::dataplane::{Route, RouteKind, RouteSource, RouterSettings};
use fibhook::telemetry::{init_logging, LogConfig, MetricsRegistry};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "fibhook")]
#[command(about = "FIB forwarding accelerator and neighbor snooper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Attach the hooks and run the daemon
    Run {
        /// Path to config.lock file
        #[arg(short, long, default_value = "config.lock")]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate config.lock from config.toml
    Generate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Output path for config.lock
        #[arg(short, long, default_value = "config.lock")]
        output: PathBuf,
    },
    /// Validate config.toml without generating lock file
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Config { action }) => {
            init_logging(None);
            match action {
                ConfigAction::Generate {
                    config: config_path,
                    output,
                } => cmd_config_generate(&config_path, &output),
                ConfigAction::Validate {
                    config: config_path,
                } => cmd_config_validate(&config_path),
            }
        }
        Some(Commands::Run { config: lock_path }) => cmd_run(&lock_path),
        None => cmd_run(&PathBuf::from("config.lock")),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(lock_path: &PathBuf) -> Result<(), String> {
    use fibhook::capture::{link, AfPacketSocket};
    use fibhook::config::{HOOK_NEIGHBOR, HOOK_ROUTER};
    use fibhook::dataplane::{event_channel, Hooks, PortConfig, Router};
    use fibhook::protocol::MacAddr;
    use ipnet::IpNet;
    use tokio::runtime::Runtime;
    use tracing::{debug, warn};

    let lock: ConfigLock = config::load_lock(lock_path)
        .map_err(|e| format!("Failed to load lock file {}: {}", lock_path.display(), e))?;

    // RUST_LOG still takes priority over the lock file
    init_logging(Some(&LogConfig::from(&lock.logging)));
    info!("Loaded {} (generated {})", lock_path.display(), lock.generated_at);

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;

    rt.block_on(async move {
        let metrics = Arc::new(MetricsRegistry::new());
        let (events_tx, events_rx) = event_channel(lock.dataplane.event_capacity);
        let router = Arc::new(Router::new(
            router_settings(&lock.dataplane),
            events_tx,
            metrics,
        ));

        let mut sockets = HashMap::new();
        let mut indices: HashMap<String, u32> = HashMap::new();

        for (name, iface_lock) in &lock.interfaces {
            let ifindex = link::interface_index(name)
                .ok_or_else(|| format!("Interface {} not found", name))?;

            let mac: MacAddr = if iface_lock.mac == "auto" {
                link::interface_mac(name).unwrap_or_else(|| {
                    warn!("Could not read MAC of {}, using 00:00:00:00:00:00", name);
                    MacAddr::ZERO
                })
            } else {
                iface_lock
                    .mac
                    .parse()
                    .map_err(|e| format!("interfaces.{}: {}", name, e))?
            };

            let addrs = [&iface_lock.address, &iface_lock.address6]
                .into_iter()
                .flatten()
                .map(|a| {
                    a.parse::<IpNet>()
                        .map_err(|e| format!("interfaces.{}: invalid address {}: {}", name, a, e))
                })
                .collect::<Result<Vec<_>, _>>()?;

            info!("Binding to interface {}...", name);
            let socket = AfPacketSocket::bind(name).map_err(|e| {
                format!(
                    "Failed to bind to {}: {}. Run with root privileges.",
                    name, e
                )
            })?;

            let hooks = Hooks {
                router: iface_lock.has_hook(HOOK_ROUTER),
                neighbor: iface_lock.has_hook(HOOK_NEIGHBOR),
            };
            router.add_port(PortConfig {
                name: name.clone(),
                ifindex,
                mac,
                addrs: addrs.clone(),
                forwarding: iface_lock.forwarding,
                hooks,
            });
            info!(
                "  {} configured: ifindex={}, MAC={}, addrs={:?}, hooks={:?}",
                name, ifindex, mac, addrs, iface_lock.hooks
            );

            sockets.insert(ifindex, Arc::new(socket));
            indices.insert(name.clone(), ifindex);
        }

        // Interface remap (e.g. vxlan -> bridge master)
        for (name, iface_lock) in &lock.interfaces {
            let Some(via) = &iface_lock.lookup_via else {
                continue;
            };
            if via == name {
                debug!("{} lookup_via refers to itself, skipped", name);
                continue;
            }
            let ingress = *indices
                .get(name)
                .ok_or_else(|| format!("Interface {} not found", name))?;
            let lookup = *indices.get(via).ok_or_else(|| {
                format!("interfaces.{}: lookup_via {} is not a configured interface", name, via)
            })?;
            router
                .set_lookup_via(ingress, lookup)
                .map_err(|e| e.to_string())?;
            info!("  {} looks up routes via {} ({} -> {})", name, via, ingress, lookup);
        }

        // Connected routes were added with their interfaces
        for route_lock in lock.routes.iter().filter(|r| r.source != "auto") {
            match parse_route(route_lock, &indices) {
                Some(route) => {
                    router.add_route(route);
                    debug!(
                        "Added route: {} via {} ({:?})",
                        route_lock.destination, route_lock.gateway, route_lock.kind
                    );
                }
                None => warn!("Skipping unusable route to {}", route_lock.destination),
            }
        }

        for neigh in &lock.neighbors {
            let ifindex = *indices
                .get(&neigh.interface)
                .ok_or_else(|| format!("neighbors: interface {} not found", neigh.interface))?;
            let ip = neigh
                .address
                .parse()
                .map_err(|e| format!("neighbors: invalid address {}: {}", neigh.address, e))?;
            let mac = neigh
                .mac
                .parse()
                .map_err(|e| format!("neighbors: invalid mac {}: {}", neigh.mac, e))?;
            router.add_neighbor(ifindex, ip, mac);
            debug!("Added neighbor {} {} on {}", neigh.address, neigh.mac, neigh.interface);
        }

        info!("Hooks attached, processing packets...");

        router
            .run(sockets, events_rx, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .map_err(|e| e.to_string())
    })
}

fn router_settings(dp: &DataplaneLock) -> RouterSettings {
    let counter_shards = if dp.counter_shards == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        dp.counter_shards
    };

    RouterSettings {
        counter_shards,
        neighbor_reachable_time: Duration::from_secs(dp.neighbor_reachable_time),
        neighbor_stale_time: Duration::from_secs(dp.neighbor_stale_time),
        refresh_interval: Duration::from_secs(dp.neighbor_refresh_interval.max(1)),
        stats_interval: (dp.stats_interval > 0).then(|| Duration::from_secs(dp.stats_interval)),
        pending_per_neighbor: dp.pending_per_neighbor,
        pending_max_age: Duration::from_secs(dp.pending_max_age),
        prune_vanished: true,
    }
}

fn parse_route(route_lock: &RouteLock, indices: &HashMap<String, u32>) -> Option<Route> {
    let destination = config::parse_prefix(&route_lock.destination)?.trunc();

    // None for connected routes
    let gateway = if route_lock.gateway == "direct" {
        None
    } else {
        Some(route_lock.gateway.parse().ok()?)
    };

    let ifindex = match &route_lock.interface {
        Some(name) => Some(*indices.get(name)?),
        None => None,
    };

    let kind = match route_lock.kind {
        RouteType::Unicast => RouteKind::Unicast,
        RouteType::Blackhole => RouteKind::Blackhole,
        RouteType::Unreachable => RouteKind::Unreachable,
        RouteType::Prohibit => RouteKind::Prohibit,
    };

    let source = match route_lock.source.as_str() {
        "auto" => RouteSource::Connected,
        _ => RouteSource::Static,
    };

    Some(Route {
        destination,
        gateway,
        ifindex,
        kind,
        source,
    })
}

fn cmd_config_generate(config_path: &PathBuf, output_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Loading {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }

    let lock = config::generate_lock(&cfg);

    let lock_toml =
        toml::to_string_pretty(&lock).map_err(|e| format!("Failed to serialize lock: {}", e))?;

    // Add header comment
    let output = format!(
        "# Generated by fibhook - DO NOT EDIT\n# Source: {}\n\n{}",
        config_path.display(),
        lock_toml
    );

    std::fs::write(output_path, output).map_err(|e| format!("Failed to write lock file: {}", e))?;

    println!("[INFO] Generated {}", output_path.display());
    Ok(())
}

fn cmd_config_validate(config_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}

//! Daemon run loop over in-memory ports: an unresolved next hop is solicited,
//! the snooped reply resolves it and the held packet goes out.

use fibhook::capture::{Capture, RxInfo};
use fibhook::dataplane::{event_channel, Hooks, PortConfig, Router, RouterSettings};
use fibhook::protocol::MacAddr;
use fibhook::telemetry::MetricsRegistry;
use fibhook::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;

const LAN_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 1, 1]);
const WAN_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 2, 1]);
const SERVER_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 2, 2]);

/// Port fed from a channel; transmitted frames land on another channel.
struct MemoryPort {
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Capture for MemoryPort {
    async fn recv(&self, buf: &mut [u8]) -> Result<RxInfo> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(RxInfo {
                    len,
                    outgoing: false,
                })
            }
            None => std::future::pending().await,
        }
    }

    async fn send(&self, buf: &[u8]) -> Result<usize> {
        let _ = self.outbound.send(buf.to_vec());
        Ok(buf.len())
    }
}

struct Wire {
    inject: mpsc::UnboundedSender<Vec<u8>>,
    sent: mpsc::UnboundedReceiver<Vec<u8>>,
}

fn memory_port() -> (Arc<MemoryPort>, Wire) {
    let (inject, inbound) = mpsc::unbounded_channel();
    let (outbound, sent) = mpsc::unbounded_channel();
    (
        Arc::new(MemoryPort {
            inbound: Mutex::new(inbound),
            outbound,
        }),
        Wire { inject, sent },
    )
}

fn ipv4_frame() -> Vec<u8> {
    let mut f = LAN_MAC.0.to_vec();
    f.extend_from_slice(&[0x02, 0, 0, 0, 1, 2]);
    f.extend_from_slice(&[0x08, 0x00]);
    f.extend_from_slice(&[0x45, 0, 0, 28, 0, 0, 0, 0, 64, 17, 0, 0]);
    f.extend_from_slice(&[10, 0, 1, 2, 10, 0, 2, 2]);
    f.extend_from_slice(&[0u8; 8]);
    f
}

fn arp_reply() -> Vec<u8> {
    let mut f = WAN_MAC.0.to_vec();
    f.extend_from_slice(&SERVER_MAC.0);
    f.extend_from_slice(&[0x08, 0x06, 0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x02]);
    f.extend_from_slice(&SERVER_MAC.0);
    f.extend_from_slice(&[10, 0, 2, 2]);
    f.extend_from_slice(&WAN_MAC.0);
    f.extend_from_slice(&[10, 0, 2, 1]);
    f
}

async fn next(wire: &mut Wire) -> Vec<u8> {
    timeout(Duration::from_secs(5), wire.sent.recv())
        .await
        .expect("timed out waiting for a transmitted frame")
        .expect("port closed")
}

#[tokio::test]
async fn test_resolve_and_release_through_run_loop() {
    let settings = RouterSettings {
        stats_interval: None,
        refresh_interval: Duration::from_secs(3600),
        prune_vanished: false,
        ..Default::default()
    };
    let (events_tx, events_rx) = event_channel(64);
    let router = Arc::new(Router::new(
        settings,
        events_tx,
        Arc::new(MetricsRegistry::new()),
    ));

    let hooks = Hooks {
        router: true,
        neighbor: true,
    };
    router.add_port(PortConfig {
        name: "lan0".into(),
        ifindex: 2,
        mac: LAN_MAC,
        addrs: vec!["10.0.1.1/24".parse().unwrap()],
        forwarding: true,
        hooks,
    });
    router.add_port(PortConfig {
        name: "wan0".into(),
        ifindex: 3,
        mac: WAN_MAC,
        addrs: vec!["10.0.2.1/24".parse().unwrap()],
        forwarding: true,
        hooks,
    });

    let (lan, lan_wire) = memory_port();
    let (wan, mut wan_wire) = memory_port();
    let sockets = HashMap::from([(2, lan), (3, wan)]);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let daemon = router.clone().run(sockets, events_rx, async {
        let _ = stop_rx.await;
    });

    let scenario = async {
        lan_wire.inject.send(ipv4_frame()).unwrap();

        let request = next(&mut wan_wire).await;
        assert_eq!(&request[0..6], &[0xff; 6]);
        assert_eq!(&request[6..12], &WAN_MAC.0);
        assert_eq!(&request[12..14], &[0x08, 0x06]);
        assert_eq!(&request[38..42], &[10, 0, 2, 2]);

        wan_wire.inject.send(arp_reply()).unwrap();

        let released = next(&mut wan_wire).await;
        assert_eq!(&released[0..6], &SERVER_MAC.0);
        assert_eq!(&released[6..12], &WAN_MAC.0);
        assert_eq!(&released[12..], &ipv4_frame()[12..]);

        // Now resolved: forwarded straight through
        lan_wire.inject.send(ipv4_frame()).unwrap();
        let direct = next(&mut wan_wire).await;
        assert_eq!(&direct[0..6], &SERVER_MAC.0);

        let _ = stop_tx.send(());
    };

    let (result, ()) = tokio::join!(daemon, scenario);
    assert!(result.is_ok());

    let metrics = router.metrics();
    assert_eq!(metrics.solicitations_sent.get(), 1);
    assert_eq!(metrics.pending_released.get(), 1);
    assert_eq!(metrics.neighbors_learned.get(), 1);
    assert_eq!(metrics.packets_redirected.get(), 1);
}

#[tokio::test]
async fn test_run_without_ports_fails() {
    let (events_tx, events_rx) = event_channel(4);
    let router = Arc::new(Router::new(
        RouterSettings::default(),
        events_tx,
        Arc::new(MetricsRegistry::new()),
    ));
    let sockets: HashMap<u32, Arc<MemoryPort>> = HashMap::new();
    assert!(router.run(sockets, events_rx, async {}).await.is_err());
}

//! Deck discovery
//!
//! Decks announce themselves with periodic JSON datagrams broadcast on the
//! control port. The listener collects them on its own thread into a peer
//! table keyed by deck GUID, so re-announcements update in place instead
//! of duplicating. A deck that stops announcing ages out after
//! `stale_after`.
//!
//! Listening is passive: nothing is ever sent on the discovery socket, and
//! an undecodable datagram is dropped without disturbing the table.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use stagelink_core::config::DiscoveryConfig;
use stagelink_core::errors::{DiscoveryError, Result, StagelinkError};
use stagelink_core::records::{DeckAnnouncement, PeerDescriptor};

/// Largest announcement datagram the listener will read. Real
/// announcements are well under 512 bytes.
const MAX_ANNOUNCEMENT_LEN: usize = 2048;

// ----------------------------------------------------------------------------
// Peer Table
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct TrackedPeer {
    descriptor: PeerDescriptor,
    last_seen: Instant,
}

fn relock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

// ----------------------------------------------------------------------------
// Listener
// ----------------------------------------------------------------------------

/// Owner handle for the discovery thread. Dropping it (or calling
/// [`DiscoveryListener::shutdown`]) stops the listener and joins the
/// thread.
#[derive(Debug)]
pub struct DiscoveryListener {
    peers: Arc<Mutex<HashMap<Uuid, TrackedPeer>>>,
    stale_after: Duration,
    local_port: u16,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl DiscoveryListener {
    /// Bind the announcement port and start listening. Port zero binds an
    /// ephemeral port, reported by [`DiscoveryListener::local_port`].
    pub fn spawn(config: DiscoveryConfig) -> Result<Self> {
        let bind_failed = |e: std::io::Error| {
            StagelinkError::Discovery(DiscoveryError::BindFailed {
                port: config.port,
                reason: e.to_string(),
            })
        };

        // Bind synchronously so the caller gets the real OS error, then
        // hand the socket to the listener thread's runtime. The port is
        // bound with reuse-addr: decks and sibling clients on the same
        // machine all listen on the broadcast port at once.
        let socket = bind_shared(config.port).map_err(bind_failed)?;
        socket.set_nonblocking(true).map_err(bind_failed)?;
        let local_port = socket.local_addr().map_err(bind_failed)?.port();

        let peers = Arc::new(Mutex::new(HashMap::new()));
        let (stop_tx, stop_rx) = oneshot::channel();
        let core = DiscoveryCore {
            stale_after: config.stale_after,
            peers: Arc::clone(&peers),
            stop: stop_rx,
        };

        let spawn_failed = |e: std::io::Error| {
            StagelinkError::Discovery(DiscoveryError::SpawnFailed {
                reason: e.to_string(),
            })
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(spawn_failed)?;
        let thread = std::thread::Builder::new()
            .name("stagelink-discovery".into())
            .spawn(move || runtime.block_on(core.run(socket)))
            .map_err(spawn_failed)?;

        info!(port = local_port, "discovery listener started");
        Ok(DiscoveryListener {
            peers,
            stale_after: config.stale_after,
            local_port,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Port the listener is actually bound to.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Every deck heard from within the staleness window, ordered by
    /// nickname for stable presentation.
    pub fn known_peers(&self) -> Vec<PeerDescriptor> {
        let peers = relock(&self.peers);
        let mut known: Vec<PeerDescriptor> = peers
            .values()
            .filter(|peer| peer.last_seen.elapsed() < self.stale_after)
            .map(|peer| peer.descriptor.clone())
            .collect();
        known.sort_by(|a, b| a.nickname.cmp(&b.nickname).then(a.guid.cmp(&b.guid)));
        known
    }

    /// Stop listening and join the thread.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("discovery thread panicked during shutdown");
            }
        }
    }
}

impl Drop for DiscoveryListener {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

// ----------------------------------------------------------------------------
// Listener Loop
// ----------------------------------------------------------------------------

struct DiscoveryCore {
    stale_after: Duration,
    peers: Arc<Mutex<HashMap<Uuid, TrackedPeer>>>,
    stop: oneshot::Receiver<()>,
}

impl DiscoveryCore {
    async fn run(mut self, socket: std::net::UdpSocket) {
        let socket = match tokio::net::UdpSocket::from_std(socket) {
            Ok(socket) => socket,
            Err(e) => {
                error!(error = %e, "discovery socket registration failed");
                return;
            }
        };

        let mut buf = vec![0u8; MAX_ANNOUNCEMENT_LEN];
        let mut sweep = tokio::time::interval(self.stale_after / 2);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut self.stop => break,
                _ = sweep.tick() => self.sweep_stale(),
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => self.track_announcement(&buf[..len], from),
                    Err(e) => warn!(error = %e, "discovery receive failed"),
                },
            }
        }
        debug!("discovery listener stopped");
    }

    fn track_announcement(&self, datagram: &[u8], from: SocketAddr) {
        let announcement: DeckAnnouncement = match serde_json::from_slice(datagram) {
            Ok(announcement) => announcement,
            Err(e) => {
                debug!(%from, error = %e, "undecodable announcement dropped");
                return;
            }
        };

        let guid = announcement.guid;
        let nickname = announcement.nickname.clone();
        let descriptor = PeerDescriptor::from_announcement(announcement, display_addr(from.ip()));
        let tracked = TrackedPeer {
            descriptor,
            last_seen: Instant::now(),
        };
        if relock(&self.peers).insert(guid, tracked).is_none() {
            info!(%guid, %nickname, %from, "deck discovered");
        }
    }

    fn sweep_stale(&self) {
        let mut peers = relock(&self.peers);
        let before = peers.len();
        peers.retain(|_, peer| peer.last_seen.elapsed() < self.stale_after);
        let dropped = before - peers.len();
        if dropped > 0 {
            debug!(dropped, "stale decks pruned");
        }
    }
}

/// Open the announcement socket with address sharing enabled, so several
/// listeners (other clients, deck software on the same host) can hold the
/// broadcast port concurrently.
fn bind_shared(port: u16) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let address: SocketAddr = ([0, 0, 0, 0], port).into();
    socket.bind(&address.into())?;
    Ok(socket.into())
}

/// Dual-stack sockets hand IPv4 senders back as mapped IPv6 addresses;
/// unmap those so the table shows the address an operator would dial.
fn display_addr(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn testing_config() -> DiscoveryConfig {
        DiscoveryConfig {
            port: 0,
            stale_after: Duration::from_millis(300),
        }
    }

    fn announce(port: u16, guid: &str, nickname: &str) {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let datagram = serde_json::to_vec(&json!({
            "GUID": guid,
            "Nickname": nickname,
            "APIVersion": "1.0",
            "CommunicatorVersion": "2.4.1",
            "CurrentRole": 0,
        }))
        .unwrap();
        socket.send_to(&datagram, ("127.0.0.1", port)).unwrap();
    }

    fn wait_until(deadline: Duration, check: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        check()
    }

    #[test]
    fn test_announcement_lands_in_peer_table() {
        let listener = DiscoveryListener::spawn(testing_config()).unwrap();
        assert_ne!(listener.local_port(), 0);

        announce(
            listener.local_port(),
            "8f14e45f-ceea-4e7a-9a3d-2f5c91a6c001",
            "Stage Left",
        );

        assert!(wait_until(Duration::from_secs(2), || {
            listener.known_peers().len() == 1
        }));
        let peers = listener.known_peers();
        assert_eq!(peers[0].nickname, "Stage Left");
        assert_eq!(peers[0].address, "127.0.0.1");
        listener.shutdown();
    }

    #[test]
    fn test_reannouncement_updates_in_place() {
        let listener = DiscoveryListener::spawn(testing_config()).unwrap();
        let guid = "8f14e45f-ceea-4e7a-9a3d-2f5c91a6c002";

        announce(listener.local_port(), guid, "Old Name");
        assert!(wait_until(Duration::from_secs(2), || {
            !listener.known_peers().is_empty()
        }));

        announce(listener.local_port(), guid, "New Name");
        assert!(wait_until(Duration::from_secs(2), || {
            listener
                .known_peers()
                .first()
                .is_some_and(|peer| peer.nickname == "New Name")
        }));
        assert_eq!(listener.known_peers().len(), 1);
    }

    #[test]
    fn test_silent_deck_ages_out() {
        let listener = DiscoveryListener::spawn(testing_config()).unwrap();

        announce(
            listener.local_port(),
            "8f14e45f-ceea-4e7a-9a3d-2f5c91a6c003",
            "Fading",
        );
        assert!(wait_until(Duration::from_secs(2), || {
            !listener.known_peers().is_empty()
        }));

        // stale_after is 300ms in the testing config.
        assert!(wait_until(Duration::from_secs(2), || {
            listener.known_peers().is_empty()
        }));
    }

    #[test]
    fn test_undecodable_datagram_is_ignored() {
        let listener = DiscoveryListener::spawn(testing_config()).unwrap();

        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .send_to(b"not json at all", ("127.0.0.1", listener.local_port()))
            .unwrap();
        announce(
            listener.local_port(),
            "8f14e45f-ceea-4e7a-9a3d-2f5c91a6c004",
            "Survivor",
        );

        assert!(wait_until(Duration::from_secs(2), || {
            listener.known_peers().len() == 1
        }));
        assert_eq!(listener.known_peers()[0].nickname, "Survivor");
    }

    #[test]
    fn test_announcement_port_is_shared() {
        // Deck software and other clients on the same machine listen on
        // the broadcast port too, so a second listener must bind alongside
        // the first.
        let first = DiscoveryListener::spawn(testing_config()).unwrap();
        let config = DiscoveryConfig {
            port: first.local_port(),
            stale_after: Duration::from_millis(300),
        };
        let second = DiscoveryListener::spawn(config).unwrap();
        assert_eq!(second.local_port(), first.local_port());

        second.shutdown();
        first.shutdown();
    }

    #[test]
    fn test_bind_conflict_reports_failure() {
        let holder = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        let taken = holder.local_addr().unwrap().port();

        let config = DiscoveryConfig {
            port: taken,
            stale_after: Duration::from_millis(300),
        };
        let err = DiscoveryListener::spawn(config).unwrap_err();
        assert!(matches!(
            err,
            StagelinkError::Discovery(DiscoveryError::BindFailed { port, .. }) if port == taken
        ));
    }
}

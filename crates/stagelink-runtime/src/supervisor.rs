//! Link supervision
//!
//! All socket I/O for every link lives on one dedicated thread running a
//! single cooperative loop. Callers talk to it through queued requests and
//! never touch a socket; per-link actor tasks own the transports and feed
//! events back into the loop. One slow link cannot starve another, because
//! the loop itself never blocks on a socket.
//!
//! The loop multiplexes three sources: caller requests (connect, outbound
//! frames, teardown), link events (inbound chunks, errors, closes), and a
//! periodic staleness scan that drives keepalive pings and prunes dead
//! links. A link with no traffic for `ping_interval` gets pinged; one
//! silent past `ping_interval + pingout` is declared dead and removed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use stagelink_core::config::LinkConfig;
use stagelink_core::errors::{Result, StagelinkError, TransportError};
use stagelink_core::framing::{Frame, FrameAssembler};
use stagelink_core::types::LinkId;

use crate::transport::{Transport, TransportConnector, TransportEvent};

/// How long a removed link's actor gets to flush queued frames and finish
/// the close handshake before it is aborted.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ----------------------------------------------------------------------------
// Hooks
// ----------------------------------------------------------------------------

/// Why a link was removed from the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDownReason {
    /// No traffic within the pingout window.
    PingTimeout,
    /// The peer closed the connection cleanly.
    PeerClosed,
    /// The transport reported an error.
    Errored,
    /// A caller asked for the teardown.
    Requested,
    /// The supervisor itself is shutting down.
    SupervisorShutdown,
}

/// Callbacks a session registers when it opens a link. Both run on the
/// supervisor's I/O thread and must not block.
pub trait LinkHooks: Send + Sync {
    /// One complete inbound frame, already reassembled.
    fn on_frame(&self, frame: Frame);

    /// The link is gone. Fired exactly once per link, for every removal
    /// reason including a requested teardown.
    fn on_link_down(&self, id: LinkId, reason: LinkDownReason);
}

// ----------------------------------------------------------------------------
// Requests and Events
// ----------------------------------------------------------------------------

enum SupervisorRequest {
    Connect {
        host: String,
        hooks: Arc<dyn LinkHooks>,
        reply: oneshot::Sender<std::result::Result<LinkId, TransportError>>,
    },
    /// A dial task finished its connect; the loop adopts the transport.
    Register {
        host: String,
        hooks: Arc<dyn LinkHooks>,
        transport: Box<dyn Transport>,
        reply: oneshot::Sender<std::result::Result<LinkId, TransportError>>,
    },
    Outbound {
        id: LinkId,
        frame: Vec<u8>,
    },
    Teardown {
        id: LinkId,
    },
    Shutdown,
}

enum LinkCommand {
    Send(Vec<u8>),
    Ping,
    Close,
}

enum LinkEvent {
    Chunk(Vec<u8>),
    Activity,
    Closed,
    Errored(TransportError),
}

// ----------------------------------------------------------------------------
// Public Handles
// ----------------------------------------------------------------------------

/// Owner handle for the I/O thread. Dropping it (or calling
/// [`LinkSupervisor::shutdown`]) tears down every link and joins the
/// thread.
pub struct LinkSupervisor {
    requests: mpsc::UnboundedSender<SupervisorRequest>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl LinkSupervisor {
    /// Start the I/O thread with the given transport factory.
    pub fn spawn(config: LinkConfig, connector: Box<dyn TransportConnector>) -> Result<Self> {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let core = SupervisorCore {
            config,
            connector: Arc::from(connector),
            requests: requests_rx,
            requests_tx: requests_tx.clone(),
            events_tx,
            events_rx,
            links: HashMap::new(),
            next_link_id: 1,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(TransportError::NetworkIo)?;
        let thread = std::thread::Builder::new()
            .name("stagelink-io".into())
            .spawn(move || runtime.block_on(core.run()))
            .map_err(TransportError::NetworkIo)?;

        Ok(LinkSupervisor {
            requests: requests_tx,
            thread: Some(thread),
        })
    }

    /// Start the I/O thread with the production WebSocket connector.
    pub fn spawn_ws(config: LinkConfig) -> Result<Self> {
        let connector = Box::new(crate::transport::WsConnector::new(config.port));
        Self::spawn(config, connector)
    }

    /// Cheap handle sessions use to open links and queue traffic.
    pub fn client(&self) -> SupervisorClient {
        SupervisorClient {
            requests: self.requests.clone(),
        }
    }

    /// Tear down every link and stop the I/O thread.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.requests.send(SupervisorRequest::Shutdown);
            if thread.join().is_err() {
                error!("supervisor I/O thread panicked during shutdown");
            }
        }
    }
}

impl Drop for LinkSupervisor {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

/// Cloneable request handle into a running supervisor.
#[derive(Clone)]
pub struct SupervisorClient {
    requests: mpsc::UnboundedSender<SupervisorRequest>,
}

impl SupervisorClient {
    /// Open a link to `host`, blocking the calling thread for the connect
    /// round trip. Must not be called from async context.
    pub fn connect(&self, host: &str, hooks: Arc<dyn LinkHooks>) -> Result<LinkHandle> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(SupervisorRequest::Connect {
                host: host.to_string(),
                hooks,
                reply: reply_tx,
            })
            .map_err(|_| StagelinkError::Transport(TransportError::SupervisorGone))?;
        let id = reply_rx
            .blocking_recv()
            .map_err(|_| StagelinkError::Transport(TransportError::SupervisorGone))??;
        Ok(LinkHandle {
            id,
            requests: self.requests.clone(),
        })
    }
}

/// Handle to one live link. Frames queue in FIFO order; a teardown request
/// queues behind them.
#[derive(Clone)]
pub struct LinkHandle {
    id: LinkId,
    requests: mpsc::UnboundedSender<SupervisorRequest>,
}

impl LinkHandle {
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Queue one encoded frame for transmission.
    pub fn enqueue_frame(&self, frame: Vec<u8>) -> std::result::Result<(), TransportError> {
        self.requests
            .send(SupervisorRequest::Outbound {
                id: self.id,
                frame,
            })
            .map_err(|_| TransportError::SupervisorGone)
    }

    /// Queue a teardown. The link's hooks still see `on_link_down`.
    pub fn disconnect(&self) {
        let _ = self.requests.send(SupervisorRequest::Teardown { id: self.id });
    }
}

// ----------------------------------------------------------------------------
// Supervisor Core
// ----------------------------------------------------------------------------

struct Link {
    host: String,
    commands: mpsc::UnboundedSender<LinkCommand>,
    actor: tokio::task::JoinHandle<()>,
    assembler: FrameAssembler,
    hooks: Arc<dyn LinkHooks>,
    last_activity: Instant,
    ping_outstanding: bool,
    errored: bool,
}

struct SupervisorCore {
    config: LinkConfig,
    connector: Arc<dyn TransportConnector>,
    requests: mpsc::UnboundedReceiver<SupervisorRequest>,
    requests_tx: mpsc::UnboundedSender<SupervisorRequest>,
    events_tx: mpsc::UnboundedSender<(LinkId, LinkEvent)>,
    events_rx: mpsc::UnboundedReceiver<(LinkId, LinkEvent)>,
    links: HashMap<LinkId, Link>,
    next_link_id: u64,
}

impl SupervisorCore {
    async fn run(mut self) {
        info!("link supervisor running");
        let mut scan = tokio::time::interval(self.config.scan_interval);
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(SupervisorRequest::Connect { host, hooks, reply }) => {
                        self.spawn_dial(host, hooks, reply);
                    }
                    Some(SupervisorRequest::Register { host, hooks, transport, reply }) => {
                        let id = self.register_link(&host, hooks, transport);
                        let _ = reply.send(Ok(id));
                    }
                    Some(SupervisorRequest::Outbound { id, frame }) => {
                        self.queue_outbound(id, frame);
                    }
                    Some(SupervisorRequest::Teardown { id }) => {
                        self.remove_link(id, LinkDownReason::Requested).await;
                    }
                    Some(SupervisorRequest::Shutdown) | None => break,
                },
                Some((id, event)) = self.events_rx.recv() => {
                    if let Some(reason) = self.apply_link_event(id, event) {
                        self.remove_link(id, reason).await;
                    }
                }
                _ = scan.tick() => {
                    for (id, reason) in self.scan_links() {
                        self.remove_link(id, reason).await;
                    }
                }
            }
        }

        let remaining: Vec<LinkId> = self.links.keys().copied().collect();
        for id in remaining {
            self.remove_link(id, LinkDownReason::SupervisorShutdown).await;
        }
        info!("link supervisor stopped");
    }

    /// Run the connect round trip off the loop, so a slow or unreachable
    /// deck cannot stall traffic on established links. The finished dial
    /// comes back as a `Register` request; if the supervisor is gone by
    /// then, the dropped reply reads as a supervisor shutdown to the
    /// caller.
    fn spawn_dial(
        &self,
        host: String,
        hooks: Arc<dyn LinkHooks>,
        reply: oneshot::Sender<std::result::Result<LinkId, TransportError>>,
    ) {
        let connector = Arc::clone(&self.connector);
        let requests = self.requests_tx.clone();
        let connect_timeout = self.config.connect_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(connect_timeout, connector.connect(&host)).await {
                Ok(Ok(transport)) => {
                    let _ = requests.send(SupervisorRequest::Register {
                        host,
                        hooks,
                        transport,
                        reply,
                    });
                }
                Ok(Err(e)) => {
                    warn!(host = %host, error = %e, "connect failed");
                    let _ = reply.send(Err(e));
                }
                Err(_) => {
                    warn!(host = %host, timeout_ms = connect_timeout.as_millis() as u64,
                        "connect timed out");
                    let _ = reply.send(Err(TransportError::ConnectFailed {
                        host,
                        reason: "connect timed out".into(),
                    }));
                }
            }
        });
    }

    fn register_link(
        &mut self,
        host: &str,
        hooks: Arc<dyn LinkHooks>,
        transport: Box<dyn Transport>,
    ) -> LinkId {
        let id = LinkId::new(self.next_link_id);
        self.next_link_id += 1;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let actor = tokio::spawn(link_actor(id, transport, commands_rx, self.events_tx.clone()));

        self.links.insert(
            id,
            Link {
                host: host.to_string(),
                commands: commands_tx,
                actor,
                assembler: FrameAssembler::new(self.config.max_frame_size),
                hooks,
                last_activity: Instant::now(),
                ping_outstanding: false,
                errored: false,
            },
        );
        info!(%id, host, "link established");
        id
    }

    fn queue_outbound(&mut self, id: LinkId, frame: Vec<u8>) {
        match self.links.get_mut(&id) {
            Some(link) if !link.errored => {
                if link.commands.send(LinkCommand::Send(frame)).is_err() {
                    link.errored = true;
                }
            }
            Some(_) => debug!(%id, "dropping frame queued on errored link"),
            None => debug!(%id, "dropping frame queued on unknown link"),
        }
    }

    /// Fold one link event into link state. Returns a removal reason when
    /// the link must go now rather than on the next scan.
    fn apply_link_event(&mut self, id: LinkId, event: LinkEvent) -> Option<LinkDownReason> {
        let Some(link) = self.links.get_mut(&id) else {
            debug!(%id, "event for already-pruned link");
            return None;
        };
        match event {
            LinkEvent::Chunk(bytes) => {
                link.last_activity = Instant::now();
                link.ping_outstanding = false;
                match link.assembler.append(&bytes) {
                    Ok(frames) => {
                        let hooks = Arc::clone(&link.hooks);
                        for frame in frames {
                            hooks.on_frame(frame);
                        }
                    }
                    Err(e) => {
                        warn!(%id, host = %link.host, error = %e,
                            "framing violation, dropping link");
                        link.errored = true;
                    }
                }
                None
            }
            LinkEvent::Activity => {
                link.last_activity = Instant::now();
                link.ping_outstanding = false;
                None
            }
            LinkEvent::Closed => {
                info!(%id, host = %link.host, "peer closed link");
                Some(LinkDownReason::PeerClosed)
            }
            LinkEvent::Errored(e) => {
                warn!(%id, host = %link.host, error = %e, "link errored");
                link.errored = true;
                None
            }
        }
    }

    /// One staleness pass: ping quiet links, collect dead and errored ones.
    fn scan_links(&mut self) -> Vec<(LinkId, LinkDownReason)> {
        let now = Instant::now();
        let mut doomed = Vec::new();
        for (id, link) in &mut self.links {
            if link.errored {
                doomed.push((*id, LinkDownReason::Errored));
                continue;
            }
            let idle = now.duration_since(link.last_activity);
            if idle >= self.config.dead_after() {
                warn!(id = %id, host = %link.host, idle_ms = idle.as_millis() as u64,
                    "no traffic within pingout window, declaring link dead");
                doomed.push((*id, LinkDownReason::PingTimeout));
            } else if idle >= self.config.ping_interval && !link.ping_outstanding {
                debug!(id = %id, "sending keepalive ping");
                if link.commands.send(LinkCommand::Ping).is_err() {
                    link.errored = true;
                } else {
                    link.ping_outstanding = true;
                }
            }
        }
        doomed
    }

    async fn remove_link(&mut self, id: LinkId, reason: LinkDownReason) {
        let Some(link) = self.links.remove(&id) else {
            return;
        };
        let _ = link.commands.send(LinkCommand::Close);
        let mut actor = link.actor;
        match reason {
            LinkDownReason::Requested | LinkDownReason::SupervisorShutdown => {
                // Queued frames drain ahead of the close command; give the
                // actor a bounded window to flush them.
                if tokio::time::timeout(CLOSE_GRACE, &mut actor).await.is_err() {
                    warn!(%id, "link actor did not drain in time, aborting");
                    actor.abort();
                }
            }
            _ => actor.abort(),
        }
        info!(%id, host = %link.host, ?reason, "link removed");
        link.hooks.on_link_down(id, reason);
    }
}

// ----------------------------------------------------------------------------
// Link Actor
// ----------------------------------------------------------------------------

/// Owns one transport: forwards queued commands out, streams received
/// events back to the supervisor loop. Exits on close or transport death.
async fn link_actor(
    id: LinkId,
    mut transport: Box<dyn Transport>,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: mpsc::UnboundedSender<(LinkId, LinkEvent)>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Send(chunk)) => {
                    if let Err(e) = transport.send(chunk).await {
                        let _ = events.send((id, LinkEvent::Errored(e)));
                        break;
                    }
                }
                Some(LinkCommand::Ping) => {
                    if let Err(e) = transport.ping().await {
                        let _ = events.send((id, LinkEvent::Errored(e)));
                        break;
                    }
                }
                Some(LinkCommand::Close) | None => {
                    transport.close().await;
                    break;
                }
            },
            received = transport.recv() => match received {
                Ok(Some(TransportEvent::Chunk(bytes))) => {
                    let _ = events.send((id, LinkEvent::Chunk(bytes)));
                }
                Ok(Some(TransportEvent::Activity)) => {
                    let _ = events.send((id, LinkEvent::Activity));
                }
                Ok(None) => {
                    let _ = events.send((id, LinkEvent::Closed));
                    break;
                }
                Err(e) => {
                    let _ = events.send((id, LinkEvent::Errored(e)));
                    break;
                }
            },
        }
    }
    debug!(%id, "link actor exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{memory_link, MemoryConnector, PeerEvent};
    use stagelink_core::framing::encode_frame;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHooks {
        frames: Mutex<Vec<Vec<u8>>>,
        downs: Mutex<Vec<(LinkId, LinkDownReason)>>,
    }

    impl LinkHooks for RecordingHooks {
        fn on_frame(&self, frame: Frame) {
            self.frames.lock().unwrap().push(frame.body().to_vec());
        }

        fn on_link_down(&self, id: LinkId, reason: LinkDownReason) {
            self.downs.lock().unwrap().push((id, reason));
        }
    }

    async fn connect_blocking(
        client: SupervisorClient,
        hooks: Arc<RecordingHooks>,
    ) -> Result<LinkHandle> {
        tokio::task::spawn_blocking(move || client.connect("deck", hooks))
            .await
            .unwrap()
    }

    async fn wait_for_down(hooks: &RecordingHooks, deadline: Duration) -> (LinkId, LinkDownReason) {
        let started = Instant::now();
        loop {
            if let Some(entry) = hooks.downs.lock().unwrap().first().copied() {
                return entry;
            }
            assert!(started.elapsed() < deadline, "no link-down within {deadline:?}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_outbound_frames_reach_the_peer_in_order() {
        let (connector, mut accepts) = memory_link();
        let supervisor = LinkSupervisor::spawn(LinkConfig::testing(), Box::new(connector)).unwrap();
        let hooks = Arc::new(RecordingHooks::default());
        let handle = connect_blocking(supervisor.client(), Arc::clone(&hooks))
            .await
            .unwrap();
        let mut peer = accepts.recv().await.unwrap();

        handle.enqueue_frame(encode_frame(b"first").unwrap()).unwrap();
        handle.enqueue_frame(encode_frame(b"second").unwrap()).unwrap();

        let mut received = Vec::new();
        while received.len() < 2 {
            match tokio::time::timeout(Duration::from_secs(1), peer.recv())
                .await
                .expect("peer starved")
            {
                Some(PeerEvent::Chunk(bytes)) => received.push(bytes),
                Some(PeerEvent::Ping) => {
                    peer.send_activity();
                }
                None => panic!("client went away"),
            };
        }
        assert_eq!(received[0], encode_frame(b"first").unwrap());
        assert_eq!(received[1], encode_frame(b"second").unwrap());
        supervisor.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_inbound_chunks_reassemble_into_frames() {
        let (connector, mut accepts) = memory_link();
        let supervisor = LinkSupervisor::spawn(LinkConfig::testing(), Box::new(connector)).unwrap();
        let hooks = Arc::new(RecordingHooks::default());
        let _handle = connect_blocking(supervisor.client(), Arc::clone(&hooks))
            .await
            .unwrap();
        let peer = accepts.recv().await.unwrap();

        // One frame split mid-body plus a second frame amalgamated on the
        // tail, exactly as a busy socket delivers them.
        let first = encode_frame(b"hello deck").unwrap();
        let second = encode_frame(b"more").unwrap();
        peer.send_chunk(first[..6].to_vec());
        let mut rest = first[6..].to_vec();
        rest.extend_from_slice(&second);
        peer.send_chunk(rest);

        let started = Instant::now();
        loop {
            if hooks.frames.lock().unwrap().len() >= 2 {
                break;
            }
            assert!(started.elapsed() < Duration::from_secs(1), "frames never arrived");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let frames = hooks.frames.lock().unwrap();
        assert_eq!(frames[0], b"hello deck");
        assert_eq!(frames[1], b"more");
        drop(frames);
        supervisor.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_quiet_link_gets_pinged_and_answer_keeps_it_alive() {
        let (connector, mut accepts) = memory_link();
        let config = LinkConfig::testing();
        let supervisor = LinkSupervisor::spawn(config.clone(), Box::new(connector)).unwrap();
        let hooks = Arc::new(RecordingHooks::default());
        let _handle = connect_blocking(supervisor.client(), Arc::clone(&hooks))
            .await
            .unwrap();
        let mut peer = accepts.recv().await.unwrap();

        // Answer the first two pings; the link must stay up well past the
        // dead-after window.
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_millis(500), peer.recv())
                .await
                .expect("no ping before deadline");
            assert_eq!(event, Some(PeerEvent::Ping));
            assert!(peer.send_activity());
        }
        assert!(hooks.downs.lock().unwrap().is_empty());

        // Stop answering; the supervisor must declare the link dead.
        let (_, reason) = wait_for_down(&hooks, config.dead_after() + Duration::from_secs(1)).await;
        assert_eq!(reason, LinkDownReason::PingTimeout);
        supervisor.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peer_close_reports_link_down() {
        let (connector, mut accepts) = memory_link();
        let supervisor = LinkSupervisor::spawn(LinkConfig::testing(), Box::new(connector)).unwrap();
        let hooks = Arc::new(RecordingHooks::default());
        let handle = connect_blocking(supervisor.client(), Arc::clone(&hooks))
            .await
            .unwrap();
        let peer = accepts.recv().await.unwrap();

        peer.close();
        let (id, reason) = wait_for_down(&hooks, Duration::from_secs(1)).await;
        assert_eq!(id, handle.id());
        assert_eq!(reason, LinkDownReason::PeerClosed);
        supervisor.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_requested_teardown_flushes_queued_frames_first() {
        let (connector, mut accepts) = memory_link();
        let supervisor = LinkSupervisor::spawn(LinkConfig::testing(), Box::new(connector)).unwrap();
        let hooks = Arc::new(RecordingHooks::default());
        let handle = connect_blocking(supervisor.client(), Arc::clone(&hooks))
            .await
            .unwrap();
        let mut peer = accepts.recv().await.unwrap();

        handle.enqueue_frame(encode_frame(b"parting shot").unwrap()).unwrap();
        handle.disconnect();

        let mut saw_frame = false;
        loop {
            match tokio::time::timeout(Duration::from_secs(1), peer.recv())
                .await
                .expect("peer starved")
            {
                Some(PeerEvent::Chunk(bytes)) => {
                    assert_eq!(bytes, encode_frame(b"parting shot").unwrap());
                    saw_frame = true;
                }
                Some(PeerEvent::Ping) => {}
                None => break,
            }
        }
        assert!(saw_frame, "queued frame was dropped by teardown");
        let (_, reason) = wait_for_down(&hooks, Duration::from_secs(1)).await;
        assert_eq!(reason, LinkDownReason::Requested);
        supervisor.shutdown();
    }

    /// Connector whose dial hangs while the switch is set, standing in for
    /// an unreachable deck mid-handshake.
    struct StallingConnector {
        inner: MemoryConnector,
        stalled: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl TransportConnector for StallingConnector {
        async fn connect(
            &self,
            host: &str,
        ) -> std::result::Result<Box<dyn Transport>, TransportError> {
            while self.stalled.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.inner.connect(host).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_dial_does_not_stall_live_links() {
        let (inner, mut accepts) = memory_link();
        let stalled = Arc::new(AtomicBool::new(false));
        let connector = StallingConnector {
            inner,
            stalled: Arc::clone(&stalled),
        };
        let mut config = LinkConfig::testing();
        config.connect_timeout = Duration::from_secs(5);
        let supervisor = LinkSupervisor::spawn(config, Box::new(connector)).unwrap();
        let hooks = Arc::new(RecordingHooks::default());
        let handle = connect_blocking(supervisor.client(), Arc::clone(&hooks))
            .await
            .unwrap();
        let mut peer = accepts.recv().await.unwrap();

        // Hang a second dial, then prove traffic on the first link still
        // flows while that dial is parked.
        stalled.store(true, Ordering::SeqCst);
        let client = supervisor.client();
        let second_hooks = Arc::new(RecordingHooks::default());
        let pending = tokio::task::spawn_blocking(move || client.connect("deck-b", second_hooks));

        handle
            .enqueue_frame(encode_frame(b"while dialing").unwrap())
            .unwrap();
        loop {
            match tokio::time::timeout(Duration::from_millis(500), peer.recv())
                .await
                .expect("pending dial stalled the supervisor loop")
            {
                Some(PeerEvent::Chunk(bytes)) => {
                    assert_eq!(bytes, encode_frame(b"while dialing").unwrap());
                    break;
                }
                Some(PeerEvent::Ping) => {
                    peer.send_activity();
                }
                None => panic!("client went away"),
            }
        }

        stalled.store(false, Ordering::SeqCst);
        let second = pending.await.unwrap().unwrap();
        assert_ne!(second.id(), handle.id());
        supervisor.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_refused_connect_surfaces_error() {
        let (connector, _accepts) = memory_link();
        connector.refusal_switch().store(true, std::sync::atomic::Ordering::SeqCst);
        let supervisor = LinkSupervisor::spawn(LinkConfig::testing(), Box::new(connector)).unwrap();
        let hooks = Arc::new(RecordingHooks::default());

        let result = connect_blocking(supervisor.client(), hooks).await;
        assert!(matches!(
            result,
            Err(StagelinkError::Transport(TransportError::ConnectFailed { .. }))
        ));
        supervisor.shutdown();
    }
}

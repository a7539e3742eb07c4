//! Wire transports
//!
//! A [`Transport`] moves opaque byte chunks and liveness signals; framing
//! and envelope semantics live above it. The production transport is a
//! WebSocket client ([`WsConnector`]), but the supervisor only ever sees
//! the trait, so tests and in-process decks plug in the memory transport
//! from [`memory_link`] instead.
//!
//! `recv` implementations must be cancel-safe: the link actor polls them
//! inside a `select!` and drops the future whenever an outbound command
//! wins the race.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use stagelink_core::errors::TransportError;

/// URL path a deck serves control traffic under.
const CONTROL_PATH: &str = "/stagelink";

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// One received unit from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw bytes. May hold a fraction of a frame or several frames
    /// back to back; the frame buffer above sorts that out.
    Chunk(Vec<u8>),
    /// A liveness signal (keepalive answer or similar) with no payload.
    Activity,
}

/// A connected bidirectional byte-chunk channel to one deck.
#[async_trait]
pub trait Transport: Send {
    /// Send one chunk. An error here means the link is no longer usable.
    async fn send(&mut self, chunk: Vec<u8>) -> Result<(), TransportError>;

    /// Send a keepalive probe the peer will answer with activity.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Receive the next event. `Ok(None)` means the peer closed cleanly.
    async fn recv(&mut self) -> Result<Option<TransportEvent>, TransportError>;

    /// Best-effort close handshake.
    async fn close(&mut self);
}

/// Factory for [`Transport`] connections, injected into the supervisor.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, host: &str) -> Result<Box<dyn Transport>, TransportError>;
}

// ----------------------------------------------------------------------------
// WebSocket Transport
// ----------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector: plain WebSocket to `ws://host:port/stagelink`.
pub struct WsConnector {
    port: u16,
}

impl WsConnector {
    pub fn new(port: u16) -> Self {
        WsConnector { port }
    }

    fn control_url(&self, host: &str) -> Result<Url, TransportError> {
        // A host may carry its own port, which wins over the configured one.
        let authority = if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:{}", host, self.port)
        };
        Url::parse(&format!("ws://{authority}{CONTROL_PATH}")).map_err(|e| {
            TransportError::ConnectFailed {
                host: host.to_string(),
                reason: format!("bad control URL: {e}"),
            }
        })
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    async fn connect(&self, host: &str) -> Result<Box<dyn Transport>, TransportError> {
        let url = self.control_url(host)?;
        debug!(%url, "opening websocket");
        let (stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectFailed {
                    host: host.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(Box::new(WsTransport { stream }))
    }
}

/// WebSocket-backed [`Transport`]. Binary and text messages both count as
/// chunks; ping and pong traffic counts as bare activity.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, chunk: Vec<u8>) -> Result<(), TransportError> {
        self.stream
            .send(Message::Binary(chunk))
            .await
            .map_err(|e| TransportError::SendFailed {
                reason: e.to_string(),
            })
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| TransportError::SendFailed {
                reason: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Result<Option<TransportEvent>, TransportError> {
        let message = match self.stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                return Err(TransportError::ReceiveFailed {
                    reason: e.to_string(),
                })
            }
            None => return Ok(None),
        };
        let event = match message {
            Message::Binary(bytes) => TransportEvent::Chunk(bytes),
            Message::Text(text) => TransportEvent::Chunk(text.into_bytes()),
            Message::Ping(payload) => {
                // Answer in place; the peer runs the same keepalive
                // scheme we do.
                self.stream
                    .send(Message::Pong(payload))
                    .await
                    .map_err(|e| TransportError::SendFailed {
                        reason: e.to_string(),
                    })?;
                TransportEvent::Activity
            }
            Message::Pong(_) | Message::Frame(_) => TransportEvent::Activity,
            Message::Close(_) => return Ok(None),
        };
        Ok(Some(event))
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

// ----------------------------------------------------------------------------
// Memory Transport
// ----------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What the deck side of a memory link sees from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Chunk(Vec<u8>),
    Ping,
}

/// Client half of an in-memory link.
pub struct MemoryTransport {
    to_peer: mpsc::UnboundedSender<PeerEvent>,
    from_peer: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Deck half of an in-memory link. Scripted decks in tests read
/// [`PeerEvent`]s and push frames and keepalive answers back.
pub struct MemoryPeer {
    from_client: mpsc::UnboundedReceiver<PeerEvent>,
    to_client: mpsc::UnboundedSender<TransportEvent>,
}

/// Create one connected in-memory transport pair.
pub fn memory_pair() -> (MemoryTransport, MemoryPeer) {
    let (to_peer, from_client) = mpsc::unbounded_channel();
    let (to_client, from_peer) = mpsc::unbounded_channel();
    (
        MemoryTransport { to_peer, from_peer },
        MemoryPeer {
            from_client,
            to_client,
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, chunk: Vec<u8>) -> Result<(), TransportError> {
        self.to_peer
            .send(PeerEvent::Chunk(chunk))
            .map_err(|_| TransportError::SendFailed {
                reason: "peer side dropped".into(),
            })
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.to_peer
            .send(PeerEvent::Ping)
            .map_err(|_| TransportError::SendFailed {
                reason: "peer side dropped".into(),
            })
    }

    async fn recv(&mut self) -> Result<Option<TransportEvent>, TransportError> {
        Ok(self.from_peer.recv().await)
    }

    async fn close(&mut self) {
        self.from_peer.close();
    }
}

impl MemoryPeer {
    /// Next event the client sent, or `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.from_client.recv().await
    }

    /// Push one chunk of frame bytes toward the client.
    pub fn send_chunk(&self, bytes: Vec<u8>) -> bool {
        self.to_client.send(TransportEvent::Chunk(bytes)).is_ok()
    }

    /// Answer a keepalive probe.
    pub fn send_activity(&self) -> bool {
        self.to_client.send(TransportEvent::Activity).is_ok()
    }

    /// Drop the peer, which the client observes as a clean close.
    pub fn close(self) {}
}

/// Connector that mints memory links on demand. Each accepted connection's
/// deck half comes out of the receiver returned by [`memory_link`], so a
/// scripted deck can serve reconnects the way a listener serves accepts.
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<MemoryPeer>,
    refusing: Arc<AtomicBool>,
}

/// Build a [`MemoryConnector`] plus the accept stream its connections
/// arrive on.
pub fn memory_link() -> (MemoryConnector, mpsc::UnboundedReceiver<MemoryPeer>) {
    let (accepted, accept_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            accepted,
            refusing: Arc::new(AtomicBool::new(false)),
        },
        accept_rx,
    )
}

impl MemoryConnector {
    /// Switch for connection-refused behavior, visible to already-spawned
    /// supervisors.
    pub fn refusal_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.refusing)
    }
}

#[async_trait]
impl TransportConnector for MemoryConnector {
    async fn connect(&self, host: &str) -> Result<Box<dyn Transport>, TransportError> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed {
                host: host.to_string(),
                reason: "connection refused".into(),
            });
        }
        let (transport, peer) = memory_pair();
        self.accepted
            .send(peer)
            .map_err(|_| TransportError::ConnectFailed {
                host: host.to_string(),
                reason: "no listener".into(),
            })?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pair_moves_chunks_both_ways() {
        let (mut transport, mut peer) = memory_pair();

        transport.send(vec![1, 2, 3]).await.unwrap();
        assert_eq!(peer.recv().await, Some(PeerEvent::Chunk(vec![1, 2, 3])));

        assert!(peer.send_chunk(vec![9]));
        assert_eq!(
            transport.recv().await.unwrap(),
            Some(TransportEvent::Chunk(vec![9]))
        );
    }

    #[tokio::test]
    async fn test_memory_peer_close_reads_as_clean_shutdown() {
        let (mut transport, peer) = memory_pair();
        peer.close();
        assert_eq!(transport.recv().await.unwrap(), None);
        assert!(transport.send(vec![0]).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_ping_and_activity() {
        let (mut transport, mut peer) = memory_pair();
        transport.ping().await.unwrap();
        assert_eq!(peer.recv().await, Some(PeerEvent::Ping));
        assert!(peer.send_activity());
        assert_eq!(
            transport.recv().await.unwrap(),
            Some(TransportEvent::Activity)
        );
    }

    #[tokio::test]
    async fn test_memory_connector_refusal_switch() {
        let (connector, mut accept_rx) = memory_link();
        let refusing = connector.refusal_switch();

        assert!(connector.connect("deck").await.is_ok());
        assert!(accept_rx.recv().await.is_some());

        refusing.store(true, Ordering::SeqCst);
        assert!(matches!(
            connector.connect("deck").await,
            Err(TransportError::ConnectFailed { .. })
        ));
    }

    #[test]
    fn test_ws_connector_url_shapes() {
        let connector = WsConnector::new(4488);
        assert_eq!(
            connector.control_url("10.0.0.5").unwrap().as_str(),
            "ws://10.0.0.5:4488/stagelink"
        );
        // An explicit port on the host wins.
        assert_eq!(
            connector.control_url("10.0.0.5:9000").unwrap().as_str(),
            "ws://10.0.0.5:9000/stagelink"
        );
        assert!(connector.control_url("not a host").is_err());
    }
}

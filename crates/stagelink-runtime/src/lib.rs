//! Stagelink Deck Session Runtime
//!
//! Everything that moves: the supervised I/O thread multiplexing all deck
//! links, the discovery listener, the reply ticket table, the mirrored
//! state cache, and the [`Session`] facade tying them together into
//! synchronous deck control. The wire protocol and data model live in
//! `stagelink-core`; this crate owns the threads and sockets.
//!
//! Typical setup: spawn one [`LinkSupervisor`] per process, then open a
//! [`Session`] per deck through its [`SupervisorClient`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod cache;
pub mod discovery;
pub mod session;
pub mod supervisor;
pub mod tickets;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use cache::{PlaybackCallback, PlaybackEvent, StateCache, StateCallback, StateEventKind};
pub use discovery::DiscoveryListener;
pub use session::{CommandError, CommandResult, DeckIdentity, Session};
pub use supervisor::{LinkDownReason, LinkHandle, LinkHooks, LinkSupervisor, SupervisorClient};
pub use tickets::{MsgIdCounter, Ticket, TicketTable, WaitOutcome};
pub use transport::{Transport, TransportConnector, TransportEvent, WsConnector};

// Re-export the core types a runtime consumer always ends up needing.
pub use stagelink_core::config::{DiscoveryConfig, LinkConfig, SessionConfig, StagelinkConfig};
pub use stagelink_core::errors::{Result, StagelinkError};
pub use stagelink_core::records::{PeerDescriptor, Preset, UnitRole};
pub use stagelink_core::status::Status;
pub use stagelink_core::types::{PresetKey, DEFAULT_PORT};

//! Stagelink Core Protocol Implementation
//!
//! Wire protocol and data model for controlling Stagelink playback decks:
//! length-prefixed framing, the JSON command envelope, the closed payload
//! type set, the status taxonomy, and the plain records the deck mirrors
//! to clients. Everything here is I/O-free; threads and sockets live in
//! `stagelink-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod envelope;
pub mod errors;
pub mod framing;
pub mod payload;
pub mod records;
pub mod status;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{DiscoveryConfig, LinkConfig, SessionConfig, StagelinkConfig};
pub use envelope::{Envelope, Inbound};
pub use errors::{Result, StagelinkError, StagelinkResult};
pub use framing::{Frame, FrameAssembler};
pub use payload::{PayloadKind, PayloadValue};
pub use records::{
    Asset, CanvasOrientation, DeckAnnouncement, HardwareState, MediaState, NetworkInfo,
    OutputChannel, PeerDescriptor, Preset, PresetState, TimeCode, UnitRole, UnitType,
};
pub use status::Status;
pub use types::{LinkId, MsgId, PresetKey, DEFAULT_PORT, PROTOCOL_VERSION};

//! Core identifier types and protocol constants
//!
//! Newtype wrappers for the protocol's identifier spaces, with serde
//! representations matching the wire format (bare integers).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Protocol Constants
// ----------------------------------------------------------------------------

/// Protocol version exchanged in every envelope. A reply carrying any other
/// version is treated as unreachable-peer territory, not best-effort data.
pub const PROTOCOL_VERSION: &str = "1.0";

/// TCP port a deck serves WebSocket control traffic on; also the UDP port
/// it broadcasts discovery announcements to.
pub const DEFAULT_PORT: u16 = 4488;

/// Inactivity span after which a keepalive ping is sent.
pub const PING_INTERVAL: Duration = Duration::from_millis(1000);

/// Further inactivity after the ping interval before a link is declared dead.
pub const PINGOUT: Duration = Duration::from_millis(3000);

/// Default bounded wait for a command reply.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// Correlation Id
// ----------------------------------------------------------------------------

/// Correlation id carried as `MsgID` on the wire.
///
/// Zero is reserved: it marks a message that expects no reply, so no ticket
/// is ever registered under it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct MsgId(u64);

impl MsgId {
    /// The reserved fire-and-forget id.
    pub const FIRE_AND_FORGET: MsgId = MsgId(0);

    pub const fn new(id: u64) -> Self {
        MsgId(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    /// True when a reply is expected and a ticket should exist for this id.
    pub const fn is_correlated(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MsgId {
    fn from(id: u64) -> Self {
        MsgId(id)
    }
}

// ----------------------------------------------------------------------------
// Preset Key
// ----------------------------------------------------------------------------

/// Primary key of a preset on the deck, carried as `PK` on the wire.
///
/// Zero addresses whichever preset is currently selected on the deck, so
/// transport commands like `Take` work without the caller tracking keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct PresetKey(i32);

impl PresetKey {
    /// Addresses the deck's currently selected preset.
    pub const SELECTED: PresetKey = PresetKey(0);

    pub const fn new(pk: i32) -> Self {
        PresetKey(pk)
    }

    pub const fn get(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for PresetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for PresetKey {
    fn from(pk: i32) -> Self {
        PresetKey(pk)
    }
}

// ----------------------------------------------------------------------------
// Link Id
// ----------------------------------------------------------------------------

/// Supervisor-local id for one live connection. Never reused within a
/// supervisor's lifetime, so a stale id from a pruned link cannot alias a
/// newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(u64);

impl LinkId {
    pub const fn new(id: u64) -> Self {
        LinkId(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

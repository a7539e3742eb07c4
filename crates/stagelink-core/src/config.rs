//! Runtime configuration
//!
//! Per-concern config structs whose defaults are the protocol's constants
//! of record. The `testing()` presets shrink every timer so integration
//! tests exercise keepalive and timeout paths in milliseconds instead of
//! seconds.

use std::time::Duration;

use crate::errors::{Result, StagelinkError};
use crate::framing::PREFIX_SIZE;
use crate::types::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_PORT, PINGOUT, PING_INTERVAL};

// ----------------------------------------------------------------------------
// Link Configuration
// ----------------------------------------------------------------------------

/// Connection supervisor and transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// TCP port the deck serves control traffic on.
    pub port: u16,
    /// Bound on transport connect plus WebSocket upgrade.
    pub connect_timeout: Duration,
    /// Inactivity span after which a keepalive ping goes out.
    pub ping_interval: Duration,
    /// Further inactivity after `ping_interval` before the link is dead.
    pub pingout: Duration,
    /// Cadence of the supervisor's staleness scan.
    pub scan_interval: Duration,
    /// Upper bound on a declared inbound frame length.
    pub max_frame_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            ping_interval: PING_INTERVAL,
            pingout: PINGOUT,
            scan_interval: Duration::from_millis(250),
            max_frame_size: 16 * 1024 * 1024,
        }
    }
}

impl LinkConfig {
    /// Millisecond-scale timers for tests.
    pub fn testing() -> Self {
        LinkConfig {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_millis(500),
            ping_interval: Duration::from_millis(50),
            pingout: Duration::from_millis(150),
            scan_interval: Duration::from_millis(10),
            max_frame_size: 64 * 1024,
        }
    }

    /// Inactivity span after which a link is declared dead.
    pub fn dead_after(&self) -> Duration {
        self.ping_interval + self.pingout
    }
}

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Command dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bounded wait for one command reply.
    pub command_timeout: Duration,
    /// Automatic reconnect attempts per command before giving up;
    /// `None` means keep trying forever.
    pub reconnect_attempts: Option<u32>,
    /// Pause between consecutive reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            reconnect_attempts: Some(3),
            reconnect_delay: Duration::from_millis(500),
        }
    }
}

impl SessionConfig {
    pub fn testing() -> Self {
        SessionConfig {
            command_timeout: Duration::from_millis(500),
            reconnect_attempts: Some(2),
            reconnect_delay: Duration::from_millis(25),
        }
    }
}

// ----------------------------------------------------------------------------
// Discovery Configuration
// ----------------------------------------------------------------------------

/// Broadcast discovery listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// UDP port decks broadcast announcements on.
    pub port: u16,
    /// A deck not re-announcing within this span drops off the peer list.
    pub stale_after: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            port: DEFAULT_PORT,
            stale_after: Duration::from_secs(10),
        }
    }
}

impl DiscoveryConfig {
    pub fn testing() -> Self {
        DiscoveryConfig {
            port: DEFAULT_PORT,
            stale_after: Duration::from_millis(300),
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Aggregate configuration for one runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagelinkConfig {
    pub link: LinkConfig,
    pub session: SessionConfig,
    pub discovery: DiscoveryConfig,
}

impl StagelinkConfig {
    pub fn testing() -> Self {
        StagelinkConfig {
            link: LinkConfig::testing(),
            session: SessionConfig::testing(),
            discovery: DiscoveryConfig::testing(),
        }
    }

    pub fn builder() -> StagelinkConfigBuilder {
        StagelinkConfigBuilder::default()
    }

    /// Reject configurations the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.link.ping_interval.is_zero() {
            return Err(StagelinkError::config_error("ping interval must be > 0"));
        }
        if self.link.pingout.is_zero() {
            return Err(StagelinkError::config_error("pingout must be > 0"));
        }
        if self.link.scan_interval.is_zero() {
            return Err(StagelinkError::config_error("scan interval must be > 0"));
        }
        if self.link.scan_interval > self.link.ping_interval {
            return Err(StagelinkError::config_error(
                "scan interval must not exceed the ping interval",
            ));
        }
        if self.link.max_frame_size <= PREFIX_SIZE {
            return Err(StagelinkError::config_error(
                "max frame size must exceed the length prefix",
            ));
        }
        if self.session.command_timeout.is_zero() {
            return Err(StagelinkError::config_error("command timeout must be > 0"));
        }
        if self.discovery.stale_after.is_zero() {
            return Err(StagelinkError::config_error(
                "discovery stale-after must be > 0",
            ));
        }
        Ok(())
    }
}

/// Builder for [`StagelinkConfig`].
#[derive(Debug, Default)]
pub struct StagelinkConfigBuilder {
    config: StagelinkConfig,
}

impl StagelinkConfigBuilder {
    pub fn link(mut self, link: LinkConfig) -> Self {
        self.config.link = link;
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    pub fn discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.config.discovery = discovery;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.session.command_timeout = timeout;
        self
    }

    pub fn reconnect_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config.session.reconnect_attempts = attempts;
        self
    }

    pub fn build(self) -> Result<StagelinkConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

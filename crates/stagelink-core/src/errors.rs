//! Error types for the Stagelink protocol runtime
//!
//! All error enums used across the workspace live here, grouped by concern
//! (framing, codec, transport, session, discovery) and unified into the
//! top-level [`StagelinkError`]. Remote rejections are not errors in this
//! sense: they travel as [`crate::status::Status`] values and surface to
//! callers through `CommandError` in the runtime crate.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Wire framing and reassembly errors
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Declared frame length {declared} is below the prefix size")]
    LengthTooSmall { declared: usize },
    #[error("Declared frame length {declared} exceeds the maximum of {max}")]
    LengthTooLarge { declared: usize, max: usize },
    #[error("Frame body of {size} bytes cannot be length-prefixed (max: {max})")]
    BodyTooLarge { size: usize, max: usize },
}

/// Envelope encode/decode errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Inbound message is not a map")]
    NotAMap,
    #[error("Missing required header field {field}")]
    MissingHeader { field: &'static str },
    #[error("Header field {field} has the wrong type")]
    MalformedHeader { field: &'static str },
    #[error("Payload does not decode as {expected}: {reason}")]
    PayloadShape { expected: &'static str, reason: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Transport-level errors, normalized to a network-error status before they
/// reach a caller
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection to {host} failed: {reason}")]
    ConnectFailed { host: String, reason: String },
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },
    #[error("Receive failed: {reason}")]
    ReceiveFailed { reason: String },
    #[error("Connection closed by peer")]
    Closed,
    #[error("No response to keepalive within {duration_ms}ms")]
    PingTimeout { duration_ms: u64 },
    #[error("Network I/O error: {0}")]
    NetworkIo(#[from] std::io::Error),
    #[error("Supervisor is shut down")]
    SupervisorGone,
}

/// Session orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not connected to {host}")]
    NotConnected { host: String },
    #[error("Handshake with {host} rejected during {step}: {reason}")]
    HandshakeRejected {
        host: String,
        step: String,
        reason: String,
    },
    #[error("Reconnect to {host} abandoned after {attempts} attempts")]
    ReconnectExhausted { host: String, attempts: u32 },
    #[error("Session is shut down")]
    ShutDown,
}

impl SessionError {
    /// A fatal handshake rejection suppresses automatic reconnection; a
    /// plain connection failure does not.
    pub fn is_serious(&self) -> bool {
        matches!(self, SessionError::HandshakeRejected { .. })
    }
}

/// Discovery listener errors
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Failed to bind discovery socket on port {port}: {reason}")]
    BindFailed { port: u16, reason: String },
    #[error("Failed to start discovery listener: {reason}")]
    SpawnFailed { reason: String },
    #[error("Listener task is not running")]
    NotRunning,
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Top-level error for the Stagelink runtime
#[derive(Debug, thiserror::Error)]
pub enum StagelinkError {
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Internal channel communication error
    #[error("Channel error: {message}")]
    Channel { message: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl StagelinkError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        StagelinkError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an internal channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        StagelinkError::Channel {
            message: message.into(),
        }
    }

    /// Create a transport connect-failed error
    pub fn connect_failed<H: Into<String>, R: Into<String>>(host: H, reason: R) -> Self {
        StagelinkError::Transport(TransportError::ConnectFailed {
            host: host.into(),
            reason: reason.into(),
        })
    }

    /// Create a fatal handshake rejection
    pub fn handshake_rejected<H: Into<String>, S: Into<String>, R: Into<String>>(
        host: H,
        step: S,
        reason: R,
    ) -> Self {
        StagelinkError::Session(SessionError::HandshakeRejected {
            host: host.into(),
            step: step.into(),
            reason: reason.into(),
        })
    }

    /// Create a missing-header codec error
    pub fn missing_header(field: &'static str) -> Self {
        StagelinkError::Codec(CodecError::MissingHeader { field })
    }

    /// True when the error is a fatal handshake rejection rather than a
    /// retryable network failure
    pub fn is_serious(&self) -> bool {
        matches!(self, StagelinkError::Session(e) if e.is_serious())
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, StagelinkError>;
pub type StagelinkResult<T> = Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serious_error_classification() {
        let fatal = StagelinkError::handshake_rejected("deck-1", "Subscribe", "refused");
        assert!(fatal.is_serious());

        let retryable = StagelinkError::connect_failed("deck-1", "connection refused");
        assert!(!retryable.is_serious());

        let config = StagelinkError::config_error("pingout shorter than ping interval");
        assert!(!config.is_serious());
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = StagelinkError::handshake_rejected("10.0.0.5", "GetSupportedSinks", "status 2");
        let text = err.to_string();
        assert!(text.contains("10.0.0.5"));
        assert!(text.contains("GetSupportedSinks"));
    }
}

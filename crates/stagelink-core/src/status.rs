//! Remote status taxonomy
//!
//! Every reply carries a status integer (`StatusInt`) plus a human-readable
//! `StatusText`. The numeric values are frozen wire constants; an integer
//! outside the known range decodes as [`Status::Invalid`] rather than
//! failing, since a newer deck may report codes this build predates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one command as reported by the deck, or synthesized locally
/// for transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Status {
    /// Decode artifact for out-of-range wire integers; never sent.
    Invalid,
    /// The deck accepted and performed the command.
    Ok,
    /// The deck rejected the request.
    Failed,
    /// The deck does not implement this command.
    Unimplemented,
    /// The deck hit an internal fault servicing the request.
    InternalError,
    /// The caller violated a precondition.
    Misused,
    /// No connection, timeout, or protocol-version mismatch. Synthesized
    /// locally as well as reported remotely.
    NetworkError,
    /// The feature is not available on this unit class.
    Unsupported,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Wire integer for this status.
    pub fn to_wire(self) -> i32 {
        self.into()
    }

    /// Decode a wire integer, mapping anything unknown to `Invalid`.
    pub fn from_wire(value: i32) -> Self {
        value.into()
    }
}

impl From<i32> for Status {
    fn from(value: i32) -> Self {
        match value {
            0 => Status::Ok,
            1 => Status::Failed,
            2 => Status::Unimplemented,
            3 => Status::InternalError,
            4 => Status::Misused,
            5 => Status::NetworkError,
            6 => Status::Unsupported,
            _ => Status::Invalid,
        }
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        match status {
            Status::Invalid => -1,
            Status::Ok => 0,
            Status::Failed => 1,
            Status::Unimplemented => 2,
            Status::InternalError => 3,
            Status::Misused => 4,
            Status::NetworkError => 5,
            Status::Unsupported => 6,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Invalid => "Invalid",
            Status::Ok => "OK",
            Status::Failed => "Failed",
            Status::Unimplemented => "Unimplemented",
            Status::InternalError => "InternalError",
            Status::Misused => "Misused",
            Status::NetworkError => "NetworkError",
            Status::Unsupported => "Unsupported",
        };
        write!(f, "{text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values_are_frozen() {
        assert_eq!(Status::Invalid.to_wire(), -1);
        assert_eq!(Status::Ok.to_wire(), 0);
        assert_eq!(Status::Failed.to_wire(), 1);
        assert_eq!(Status::Unimplemented.to_wire(), 2);
        assert_eq!(Status::InternalError.to_wire(), 3);
        assert_eq!(Status::Misused.to_wire(), 4);
        assert_eq!(Status::NetworkError.to_wire(), 5);
        assert_eq!(Status::Unsupported.to_wire(), 6);
    }

    #[test]
    fn test_round_trip_known_codes() {
        for code in -1..=6 {
            let status = Status::from_wire(code);
            if status != Status::Invalid {
                assert_eq!(status.to_wire(), code);
            }
        }
    }

    #[test]
    fn test_unknown_codes_decode_as_invalid() {
        assert_eq!(Status::from_wire(7), Status::Invalid);
        assert_eq!(Status::from_wire(9000), Status::Invalid);
        assert_eq!(Status::from_wire(-2), Status::Invalid);
    }

    #[test]
    fn test_serde_uses_wire_integers() {
        let json = serde_json::to_value(Status::NetworkError).unwrap();
        assert_eq!(json, serde_json::json!(5));
        let back: Status = serde_json::from_value(serde_json::json!(0)).unwrap();
        assert_eq!(back, Status::Ok);
    }
}

//! Envelope codec
//!
//! One frame body carries one JSON envelope. Outgoing requests are
//! `{CommandName, ProtocolVersion, MsgID, Data?}`; inbound traffic is
//! either a reply `{CommandName, ProtocolVersion, MsgID, StatusInt,
//! StatusText, Data?}` or an unsolicited push `{SubscriptionEvent, Data}`.
//! The presence of `MsgID` decides which: a message carrying one is always
//! a reply and must carry the full reply header set.
//!
//! A reply whose `ProtocolVersion` differs from ours still decodes, but its
//! status is forced to [`Status::NetworkError`] so no caller ever acts on
//! data produced by an incompatible peer.

use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::CodecError;
use crate::payload::PayloadValue;
use crate::status::Status;
use crate::types::{MsgId, PROTOCOL_VERSION};

// ----------------------------------------------------------------------------
// Envelope Types
// ----------------------------------------------------------------------------

/// A decoded reply envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub command: String,
    pub protocol_version: String,
    pub msg_id: MsgId,
    pub status: Status,
    pub status_text: String,
    /// Raw `Data` field; the consumer decodes it via
    /// [`crate::payload::PayloadKind`] once it knows what to expect.
    pub payload: Option<Value>,
}

/// Classification of one inbound frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Correlated reply to an outstanding request.
    Reply(Envelope),
    /// Unsolicited push event, delivered without a `MsgID`.
    Event { name: String, payload: Value },
}

// ----------------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------------

/// Encode an outgoing command envelope. `MsgID` is always written, zero
/// meaning no reply is expected.
pub fn encode_command(
    command: &str,
    msg_id: MsgId,
    payload: Option<&PayloadValue>,
) -> Result<Vec<u8>, CodecError> {
    let mut map = Map::new();
    map.insert("CommandName".into(), Value::String(command.into()));
    map.insert(
        "ProtocolVersion".into(),
        Value::String(PROTOCOL_VERSION.into()),
    );
    map.insert("MsgID".into(), Value::from(msg_id.get()));
    if let Some(payload) = payload {
        map.insert("Data".into(), payload.to_wire()?);
    }
    Ok(serde_json::to_vec(&Value::Object(map))?)
}

/// Encode a reply envelope. The client never sends these; they exist for
/// deck-side peers and for the scripted decks the tests run against.
pub fn encode_reply(
    command: &str,
    msg_id: MsgId,
    status: Status,
    status_text: &str,
    payload: Option<&PayloadValue>,
) -> Result<Vec<u8>, CodecError> {
    let mut map = Map::new();
    map.insert("CommandName".into(), Value::String(command.into()));
    map.insert(
        "ProtocolVersion".into(),
        Value::String(PROTOCOL_VERSION.into()),
    );
    map.insert("MsgID".into(), Value::from(msg_id.get()));
    map.insert("StatusInt".into(), Value::from(status.to_wire()));
    map.insert("StatusText".into(), Value::String(status_text.into()));
    if let Some(payload) = payload {
        map.insert("Data".into(), payload.to_wire()?);
    }
    Ok(serde_json::to_vec(&Value::Object(map))?)
}

/// Encode an unsolicited push event envelope.
pub fn encode_event(name: &str, payload: &PayloadValue) -> Result<Vec<u8>, CodecError> {
    let mut map = Map::new();
    map.insert("SubscriptionEvent".into(), Value::String(name.into()));
    map.insert("Data".into(), payload.to_wire()?);
    Ok(serde_json::to_vec(&Value::Object(map))?)
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

/// Decode and classify one inbound frame body.
pub fn decode_inbound(bytes: &[u8]) -> Result<Inbound, CodecError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let map = match value {
        Value::Object(map) => map,
        _ => return Err(CodecError::NotAMap),
    };

    if !map.contains_key("MsgID") {
        if map.contains_key("SubscriptionEvent") {
            return decode_event(map);
        }
        return Err(CodecError::MissingHeader { field: "MsgID" });
    }

    decode_reply(map)
}

fn decode_event(map: Map<String, Value>) -> Result<Inbound, CodecError> {
    let name = string_field(&map, "SubscriptionEvent")?;
    let payload = map
        .get("Data")
        .cloned()
        .ok_or(CodecError::MissingHeader { field: "Data" })?;
    Ok(Inbound::Event { name, payload })
}

fn decode_reply(map: Map<String, Value>) -> Result<Inbound, CodecError> {
    let command = string_field(&map, "CommandName")?;
    let protocol_version = string_field(&map, "ProtocolVersion")?;
    let msg_id = MsgId::new(u64_field(&map, "MsgID")?);
    let status_int = i32_field(&map, "StatusInt")?;
    let status_text = string_field(&map, "StatusText")?;
    let payload = map.get("Data").cloned();

    let mut status = Status::from_wire(status_int);
    if protocol_version != PROTOCOL_VERSION {
        warn!(
            reported = %protocol_version,
            expected = PROTOCOL_VERSION,
            command = %command,
            "protocol version mismatch, forcing network-error status"
        );
        status = Status::NetworkError;
    }

    Ok(Inbound::Reply(Envelope {
        command,
        protocol_version,
        msg_id,
        status,
        status_text,
        payload,
    }))
}

fn string_field(map: &Map<String, Value>, field: &'static str) -> Result<String, CodecError> {
    map.get(field)
        .ok_or(CodecError::MissingHeader { field })?
        .as_str()
        .map(str::to_string)
        .ok_or(CodecError::MalformedHeader { field })
}

fn u64_field(map: &Map<String, Value>, field: &'static str) -> Result<u64, CodecError> {
    map.get(field)
        .ok_or(CodecError::MissingHeader { field })?
        .as_u64()
        .ok_or(CodecError::MalformedHeader { field })
}

fn i32_field(map: &Map<String, Value>, field: &'static str) -> Result<i32, CodecError> {
    let raw = map
        .get(field)
        .ok_or(CodecError::MissingHeader { field })?
        .as_i64()
        .ok_or(CodecError::MalformedHeader { field })?;
    i32::try_from(raw).map_err(|_| CodecError::MalformedHeader { field })
}

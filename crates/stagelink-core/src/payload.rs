//! Typed command payloads
//!
//! The set of payload shapes a `Data` field can carry is closed and known
//! at build time. [`PayloadValue`] enumerates it; [`PayloadKind`] is the
//! tag used to decode an inbound `Data` field once the surrounding context
//! (command or event name) has said what to expect. Dispatch is a plain
//! `match` — adding a payload shape means adding a variant, and the
//! compiler finds every site that must handle it.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::CodecError;
use crate::records::{
    Asset, CanvasOrientation, HardwareState, MediaState, NetworkInfo, Preset, PresetState,
    TimeCode,
};

// ----------------------------------------------------------------------------
// Payload Value
// ----------------------------------------------------------------------------

/// One decoded (or to-be-encoded) `Data` field.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Preset(Preset),
    PresetList(Vec<Preset>),
    PresetStateList(Vec<PresetState>),
    TimeCode(TimeCode),
    Asset(Asset),
    AssetList(Vec<Asset>),
    HardwareState(HardwareState),
    NetworkInfo(NetworkInfo),
    MediaState(MediaState),
    Orientation(CanvasOrientation),
    Text(String),
    /// Bare string array, used for sink and disk enumerations.
    TextList(Vec<String>),
    Integer(i64),
    /// Ad-hoc argument bag for outgoing commands (`{"PK": 5}` and friends).
    Map(serde_json::Map<String, Value>),
}

impl PayloadValue {
    /// Wire representation of this payload, suitable for an envelope's
    /// `Data` field.
    pub fn to_wire(&self) -> Result<Value, CodecError> {
        let value = match self {
            PayloadValue::Preset(v) => serde_json::to_value(v)?,
            PayloadValue::PresetList(v) => serde_json::to_value(v)?,
            PayloadValue::PresetStateList(v) => serde_json::to_value(v)?,
            PayloadValue::TimeCode(v) => serde_json::to_value(v)?,
            PayloadValue::Asset(v) => serde_json::to_value(v)?,
            PayloadValue::AssetList(v) => serde_json::to_value(v)?,
            PayloadValue::HardwareState(v) => serde_json::to_value(v)?,
            PayloadValue::NetworkInfo(v) => serde_json::to_value(v)?,
            PayloadValue::MediaState(v) => serde_json::to_value(v)?,
            PayloadValue::Orientation(v) => serde_json::to_value(v)?,
            PayloadValue::Text(v) => Value::String(v.clone()),
            PayloadValue::TextList(v) => serde_json::to_value(v)?,
            PayloadValue::Integer(v) => Value::from(*v),
            PayloadValue::Map(v) => Value::Object(v.clone()),
        };
        Ok(value)
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            PayloadValue::Preset(_) => PayloadKind::Preset,
            PayloadValue::PresetList(_) => PayloadKind::PresetList,
            PayloadValue::PresetStateList(_) => PayloadKind::PresetStateList,
            PayloadValue::TimeCode(_) => PayloadKind::TimeCode,
            PayloadValue::Asset(_) => PayloadKind::Asset,
            PayloadValue::AssetList(_) => PayloadKind::AssetList,
            PayloadValue::HardwareState(_) => PayloadKind::HardwareState,
            PayloadValue::NetworkInfo(_) => PayloadKind::NetworkInfo,
            PayloadValue::MediaState(_) => PayloadKind::MediaState,
            PayloadValue::Orientation(_) => PayloadKind::Orientation,
            PayloadValue::Text(_) => PayloadKind::Text,
            PayloadValue::TextList(_) => PayloadKind::TextList,
            PayloadValue::Integer(_) => PayloadKind::Integer,
            PayloadValue::Map(_) => PayloadKind::Map,
        }
    }

    // Accessors consume the value: a payload is decoded once and handed to
    // exactly one consumer.

    pub fn into_preset(self) -> Option<Preset> {
        match self {
            PayloadValue::Preset(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_preset_list(self) -> Option<Vec<Preset>> {
        match self {
            PayloadValue::PresetList(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_preset_state_list(self) -> Option<Vec<PresetState>> {
        match self {
            PayloadValue::PresetStateList(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_time_code(self) -> Option<TimeCode> {
        match self {
            PayloadValue::TimeCode(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_asset(self) -> Option<Asset> {
        match self {
            PayloadValue::Asset(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_asset_list(self) -> Option<Vec<Asset>> {
        match self {
            PayloadValue::AssetList(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_hardware_state(self) -> Option<HardwareState> {
        match self {
            PayloadValue::HardwareState(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_network_info(self) -> Option<NetworkInfo> {
        match self {
            PayloadValue::NetworkInfo(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_media_state(self) -> Option<MediaState> {
        match self {
            PayloadValue::MediaState(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_orientation(self) -> Option<CanvasOrientation> {
        match self {
            PayloadValue::Orientation(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            PayloadValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_text_list(self) -> Option<Vec<String>> {
        match self {
            PayloadValue::TextList(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_integer(self) -> Option<i64> {
        match self {
            PayloadValue::Integer(v) => Some(v),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Payload Kind
// ----------------------------------------------------------------------------

/// Tag naming one payload shape, used to decode an inbound `Data` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Preset,
    PresetList,
    PresetStateList,
    TimeCode,
    Asset,
    AssetList,
    HardwareState,
    NetworkInfo,
    MediaState,
    Orientation,
    Text,
    TextList,
    Integer,
    Map,
}

impl PayloadKind {
    /// Decode a raw `Data` value as this kind.
    pub fn decode(self, raw: &Value) -> Result<PayloadValue, CodecError> {
        let decoded = match self {
            PayloadKind::Preset => PayloadValue::Preset(shaped(raw, "Preset")?),
            PayloadKind::PresetList => PayloadValue::PresetList(shaped(raw, "Vec<Preset>")?),
            PayloadKind::PresetStateList => {
                PayloadValue::PresetStateList(shaped(raw, "Vec<PresetState>")?)
            }
            PayloadKind::TimeCode => PayloadValue::TimeCode(shaped(raw, "TimeCode")?),
            PayloadKind::Asset => PayloadValue::Asset(shaped(raw, "Asset")?),
            PayloadKind::AssetList => PayloadValue::AssetList(shaped(raw, "Vec<Asset>")?),
            PayloadKind::HardwareState => {
                PayloadValue::HardwareState(shaped(raw, "HardwareState")?)
            }
            PayloadKind::NetworkInfo => PayloadValue::NetworkInfo(shaped(raw, "NetworkInfo")?),
            PayloadKind::MediaState => PayloadValue::MediaState(shaped(raw, "MediaState")?),
            PayloadKind::Orientation => {
                PayloadValue::Orientation(shaped(raw, "CanvasOrientation")?)
            }
            PayloadKind::Text => PayloadValue::Text(shaped(raw, "String")?),
            PayloadKind::TextList => PayloadValue::TextList(shaped(raw, "Vec<String>")?),
            PayloadKind::Integer => PayloadValue::Integer(shaped(raw, "i64")?),
            PayloadKind::Map => PayloadValue::Map(shaped(raw, "Map")?),
        };
        Ok(decoded)
    }
}

fn shaped<T: DeserializeOwned>(raw: &Value, expected: &'static str) -> Result<T, CodecError> {
    serde_json::from_value(raw.clone()).map_err(|e| CodecError::PayloadShape {
        expected,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PresetKey;
    use serde_json::json;

    #[test]
    fn test_kind_decode_round_trips_each_shape() {
        let preset = Preset {
            pk: PresetKey::new(2),
            name: "Intro".into(),
            ..Preset::default()
        };
        let original = PayloadValue::PresetList(vec![preset]);

        let wire = original.to_wire().unwrap();
        let back = PayloadKind::PresetList.decode(&wire).unwrap();
        assert_eq!(back, original);
        assert_eq!(back.kind(), PayloadKind::PresetList);
    }

    #[test]
    fn test_kind_decode_rejects_wrong_shape() {
        let wire = json!("just a string");
        let err = PayloadKind::HardwareState.decode(&wire).unwrap_err();
        match err {
            CodecError::PayloadShape { expected, .. } => assert_eq!(expected, "HardwareState"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_text_and_integer_primitives() {
        let text = PayloadValue::Text("/media/x.mp4".into());
        assert_eq!(text.to_wire().unwrap(), json!("/media/x.mp4"));
        assert_eq!(
            PayloadKind::Text.decode(&json!("/media/x.mp4")).unwrap(),
            text
        );

        let number = PayloadValue::Integer(-3);
        assert_eq!(number.to_wire().unwrap(), json!(-3));
        assert_eq!(
            PayloadKind::Integer
                .decode(&json!(-3))
                .unwrap()
                .into_integer(),
            Some(-3)
        );
    }

    #[test]
    fn test_orientation_payload_round_trip() {
        let simple = PayloadValue::Orientation(CanvasOrientation::Landscape);
        assert_eq!(simple.to_wire().unwrap(), json!("Landscape"));

        let custom = PayloadValue::Orientation(CanvasOrientation::Custom(3840, 1080));
        let wire = custom.to_wire().unwrap();
        assert_eq!(wire, json!({ "Custom": [3840, 1080] }));
        assert_eq!(PayloadKind::Orientation.decode(&wire).unwrap(), custom);
    }

    #[test]
    fn test_text_list_payload() {
        let wire = json!(["HDMI", "SDI-A", "SDI-B"]);
        let sinks = PayloadKind::TextList.decode(&wire).unwrap();
        assert_eq!(
            sinks.into_text_list().as_deref(),
            Some(&["HDMI".to_string(), "SDI-A".into(), "SDI-B".into()][..])
        );
    }

    #[test]
    fn test_accessor_returns_none_on_kind_mismatch() {
        let payload = PayloadValue::Integer(12);
        assert!(payload.clone().into_text().is_none());
        assert_eq!(payload.into_integer(), Some(12));
    }
}

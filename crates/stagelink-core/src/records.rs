//! Plain data records mirrored from the deck
//!
//! Value structs with no behavior beyond serde round-tripping. Field names
//! follow Rust conventions; `#[serde(rename)]` pins each to its frozen wire
//! name, and `#[serde(default)]` lets a deck omit fields without breaking
//! the mirror. Integer-coded enums map unknown wire values to their
//! `Invalid` variant the same way [`crate::status::Status`] does.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::PresetKey;

// ----------------------------------------------------------------------------
// Playback Records
// ----------------------------------------------------------------------------

/// One output channel of a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputChannel {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "Active")]
    pub active: bool,
    #[serde(rename = "Audio")]
    pub audio: bool,
    #[serde(rename = "MediaId")]
    pub media_id: i32,
    #[serde(rename = "FadeOut")]
    pub fade_out: f64,
    #[serde(rename = "Delay")]
    pub delay: f64,
    #[serde(rename = "Hue")]
    pub hue: i32,
    #[serde(rename = "Saturation")]
    pub saturation: i32,
    #[serde(rename = "Contrast")]
    pub contrast: i32,
    #[serde(rename = "Brightness")]
    pub brightness: i32,
}

/// A stored playback preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Preset {
    #[serde(rename = "PK")]
    pub pk: PresetKey,
    #[serde(rename = "Index")]
    pub index: i32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Layout")]
    pub layout: String,
    #[serde(rename = "Notes")]
    pub notes: String,
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Loop")]
    pub loop_mode: bool,
    #[serde(rename = "Link")]
    pub link_pk: i32,
    #[serde(rename = "DisplayLink")]
    pub display_link: i32,
    #[serde(rename = "Fade")]
    pub fade_secs: f64,
    #[serde(rename = "LeftVolume")]
    pub left_volume: i32,
    #[serde(rename = "RightVolume")]
    pub right_volume: i32,
    #[serde(rename = "VolumeLinked")]
    pub volume_linked: bool,
    #[serde(rename = "InPosition")]
    pub in_position: u32,
    #[serde(rename = "OutPosition")]
    pub out_position: u32,
    #[serde(rename = "Outputs")]
    pub outputs: Vec<OutputChannel>,
}

/// Live playback flags for one preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PresetState {
    #[serde(rename = "PK")]
    pub pk: PresetKey,
    #[serde(rename = "IsPlaying")]
    pub is_playing: bool,
    #[serde(rename = "IsPaused")]
    pub is_paused: bool,
    #[serde(rename = "Selected")]
    pub selected: bool,
}

/// Running time code of one preset. `trt` and `time` are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TimeCode {
    #[serde(rename = "PK")]
    pub pk: PresetKey,
    #[serde(rename = "TRT")]
    pub trt: u32,
    #[serde(rename = "Time")]
    pub time: u32,
    #[serde(rename = "ScrubBar")]
    pub scrub_bar: f64,
    #[serde(rename = "Selected")]
    pub selected: bool,
}

/// One media file known to the deck, including in-flight copy progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Asset {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "NewFileName")]
    pub new_file_name: String,
    #[serde(rename = "CopyPercentage")]
    pub copy_percentage: u32,
    #[serde(rename = "IsReady")]
    pub is_ready: bool,
}

/// Aggregate playback summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediaState {
    #[serde(rename = "NumPresets")]
    pub num_presets: i32,
    #[serde(rename = "Selected")]
    pub selected_preset: PresetKey,
    #[serde(rename = "PlayingPresets")]
    pub playing_presets: Vec<PresetKey>,
    #[serde(rename = "PausedPresets")]
    pub paused_presets: Vec<PresetKey>,
    #[serde(rename = "TimeCode")]
    pub time_code: TimeCode,
}

// ----------------------------------------------------------------------------
// Hardware Records
// ----------------------------------------------------------------------------

/// SDI signal chain mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "i32", into = "i32")]
pub enum HardwareMode {
    Invalid,
    #[default]
    Q3G,
    S12G,
}

impl From<i32> for HardwareMode {
    fn from(value: i32) -> Self {
        match value {
            0 => HardwareMode::Q3G,
            1 => HardwareMode::S12G,
            _ => HardwareMode::Invalid,
        }
    }
}

impl From<HardwareMode> for i32 {
    fn from(mode: HardwareMode) -> Self {
        match mode {
            HardwareMode::Invalid => -1,
            HardwareMode::Q3G => 0,
            HardwareMode::S12G => 1,
        }
    }
}

/// Output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "i32", into = "i32")]
pub enum ResolutionMode {
    #[default]
    Invalid,
    R1080p,
    R2160p,
}

impl From<i32> for ResolutionMode {
    fn from(value: i32) -> Self {
        match value {
            1 => ResolutionMode::R1080p,
            2 => ResolutionMode::R2160p,
            _ => ResolutionMode::Invalid,
        }
    }
}

impl From<ResolutionMode> for i32 {
    fn from(mode: ResolutionMode) -> Self {
        match mode {
            ResolutionMode::Invalid => 0,
            ResolutionMode::R1080p => 1,
            ResolutionMode::R2160p => 2,
        }
    }
}

/// Output refresh rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "i32", into = "i32")]
pub enum RefreshMode {
    #[default]
    Invalid,
    R23_98,
    R24,
    R25,
    R29_97,
    R30,
    R50,
    R59_94,
    R60,
}

impl From<i32> for RefreshMode {
    fn from(value: i32) -> Self {
        match value {
            1 => RefreshMode::R23_98,
            2 => RefreshMode::R24,
            3 => RefreshMode::R25,
            4 => RefreshMode::R29_97,
            5 => RefreshMode::R30,
            6 => RefreshMode::R50,
            7 => RefreshMode::R59_94,
            8 => RefreshMode::R60,
            _ => RefreshMode::Invalid,
        }
    }
}

impl From<RefreshMode> for i32 {
    fn from(mode: RefreshMode) -> Self {
        match mode {
            RefreshMode::Invalid => 0,
            RefreshMode::R23_98 => 1,
            RefreshMode::R24 => 2,
            RefreshMode::R25 => 3,
            RefreshMode::R29_97 => 4,
            RefreshMode::R30 => 5,
            RefreshMode::R50 => 6,
            RefreshMode::R59_94 => 7,
            RefreshMode::R60 => 8,
        }
    }
}

/// Deck product class, reported during first contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnitType {
    #[default]
    Server,
    Mini,
    Software,
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnitType::Server => "Server",
            UnitType::Mini => "Mini",
            UnitType::Software => "Software",
        };
        write!(f, "{text}")
    }
}

/// Signal-chain snapshot of the deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HardwareState {
    #[serde(rename = "UnitType")]
    pub unit_type: UnitType,
    #[serde(rename = "Resolution")]
    pub resolution: ResolutionMode,
    #[serde(rename = "RefreshRate")]
    pub refresh_rate: RefreshMode,
    #[serde(rename = "CurrentMode")]
    pub current_mode: HardwareMode,
    #[serde(rename = "SupportsS12G")]
    pub supports_s12g: bool,
}

/// Address assignment of one deck network adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkInfo {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Subnet")]
    pub subnet: String,
    #[serde(rename = "AdapterID")]
    pub adapter_id: i32,
}

// ----------------------------------------------------------------------------
// Mirroring and Discovery Records
// ----------------------------------------------------------------------------

/// Role of a deck in a mirrored pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "i32", into = "i32")]
pub enum UnitRole {
    #[default]
    Solo,
    Primary,
    Mirror,
}

impl From<i32> for UnitRole {
    fn from(value: i32) -> Self {
        match value {
            1 => UnitRole::Primary,
            2 => UnitRole::Mirror,
            _ => UnitRole::Solo,
        }
    }
}

impl From<UnitRole> for i32 {
    fn from(role: UnitRole) -> Self {
        match role {
            UnitRole::Solo => 0,
            UnitRole::Primary => 1,
            UnitRole::Mirror => 2,
        }
    }
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnitRole::Solo => "Solo",
            UnitRole::Primary => "Primary",
            UnitRole::Mirror => "Mirror",
        };
        write!(f, "{text}")
    }
}

/// Broadcast announcement datagram a deck emits on the discovery port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckAnnouncement {
    #[serde(rename = "GUID")]
    pub guid: uuid::Uuid,
    #[serde(rename = "Nickname")]
    pub nickname: String,
    #[serde(rename = "APIVersion")]
    pub api_version: String,
    #[serde(rename = "CommunicatorVersion")]
    pub unit_version: String,
    #[serde(rename = "CurrentRole")]
    pub role: UnitRole,
}

/// One deck known to the discovery listener: the latest announcement plus
/// the address it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    pub guid: uuid::Uuid,
    pub nickname: String,
    pub api_version: String,
    pub unit_version: String,
    pub role: UnitRole,
    pub address: String,
}

impl PeerDescriptor {
    pub fn from_announcement(announcement: DeckAnnouncement, address: String) -> Self {
        PeerDescriptor {
            guid: announcement.guid,
            nickname: announcement.nickname,
            api_version: announcement.api_version,
            unit_version: announcement.unit_version,
            role: announcement.role,
            address,
        }
    }
}

// ----------------------------------------------------------------------------
// Canvas Orientation
// ----------------------------------------------------------------------------

/// Canvas orientation of the deck's output surface.
///
/// Wire form is serde's external tagging: the unit variants travel as bare
/// strings (`"Landscape"`), the custom variant as a one-entry map keyed by
/// the variant name (`{"Custom": [w, h]}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanvasOrientation {
    Landscape,
    Portrait,
    Custom(u32, u32),
}

impl Default for CanvasOrientation {
    fn default() -> Self {
        CanvasOrientation::Landscape
    }
}

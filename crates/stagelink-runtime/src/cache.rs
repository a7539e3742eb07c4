//! Subscription state mirror
//!
//! Push events from the deck land here and nowhere else. Each event
//! category has its own lock, so a burst of time codes never contends with
//! a preset snapshot. Reads hand out copies; nothing a caller holds aliases
//! the live mirror.
//!
//! Snapshot events (`Presets`, `PresetStates`, `Assets`, `HardwareState`)
//! replace their whole category. Incremental events (`TimeCode`,
//! `AssetPost`, `AssetDelete`) touch a single entry. An event that fails to
//! decode is dropped with a warning; the mirror keeps its last good state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use stagelink_core::payload::PayloadKind;
use stagelink_core::records::{Asset, HardwareState, Preset, PresetState, TimeCode};
use stagelink_core::types::PresetKey;

// ----------------------------------------------------------------------------
// Event Categories
// ----------------------------------------------------------------------------

/// The subscription categories a deck pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateEventKind {
    TimeCodes,
    Presets,
    PresetStates,
    Assets,
    HardwareState,
}

impl StateEventKind {
    pub const ALL: [StateEventKind; 5] = [
        StateEventKind::TimeCodes,
        StateEventKind::Presets,
        StateEventKind::PresetStates,
        StateEventKind::Assets,
        StateEventKind::HardwareState,
    ];

    /// Category name as it appears in a `Subscribe` request.
    pub fn wire_name(&self) -> &'static str {
        match self {
            StateEventKind::TimeCodes => "TimeCode",
            StateEventKind::Presets => "Presets",
            StateEventKind::PresetStates => "PresetStates",
            StateEventKind::Assets => "Assets",
            StateEventKind::HardwareState => "HardwareState",
        }
    }
}

/// Playback activity digest derived from a `PresetStates` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackEvent {
    pub playing: Vec<PresetKey>,
    pub paused: Vec<PresetKey>,
}

pub type StateCallback = Arc<dyn Fn(StateEventKind) + Send + Sync>;
pub type PlaybackCallback = Arc<dyn Fn(&PlaybackEvent) + Send + Sync>;

// ----------------------------------------------------------------------------
// State Cache
// ----------------------------------------------------------------------------

/// Client-side mirror of the deck state the subscriptions cover.
pub struct StateCache {
    time_codes: Mutex<HashMap<PresetKey, TimeCode>>,
    presets: Mutex<HashMap<PresetKey, Preset>>,
    preset_states: Mutex<HashMap<PresetKey, PresetState>>,
    assets: Mutex<HashMap<String, Asset>>,
    hardware: Mutex<Option<HardwareState>>,
    callbacks: Mutex<HashMap<StateEventKind, StateCallback>>,
    playback_callback: Mutex<Option<PlaybackCallback>>,
}

// A poisoned lock means some reader panicked mid-copy; the mapped data
// itself is still sound, so recover the guard rather than spreading the
// panic to the I/O thread.
fn relock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StateCache {
    pub fn new() -> Self {
        StateCache {
            time_codes: Mutex::new(HashMap::new()),
            presets: Mutex::new(HashMap::new()),
            preset_states: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            hardware: Mutex::new(None),
            callbacks: Mutex::new(HashMap::new()),
            playback_callback: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------------
    // Event Application
    // ------------------------------------------------------------------------

    /// Apply one push event to the mirror. Returns true when the event was
    /// recognized, decoded, and applied; callbacks fire only in that case.
    pub fn apply_event(&self, name: &str, payload: &Value) -> bool {
        let applied = match name {
            "Presets" => self.replace_presets(payload),
            "PresetStates" => self.replace_preset_states(payload),
            "Assets" => self.replace_assets(payload),
            "HardwareState" => self.replace_hardware(payload),
            "TimeCode" => self.upsert_time_code(payload),
            "AssetPost" => self.upsert_asset(payload),
            "AssetDelete" => self.delete_asset(payload),
            other => {
                // A newer deck may push categories we never subscribed to.
                debug!(event = other, "ignoring unrecognized push event");
                return false;
            }
        };
        match applied {
            Some(kind) => {
                self.notify(kind);
                true
            }
            None => {
                warn!(event = name, "push event payload did not decode, dropped");
                false
            }
        }
    }

    fn replace_presets(&self, payload: &Value) -> Option<StateEventKind> {
        let list = PayloadKind::PresetList
            .decode(payload)
            .ok()?
            .into_preset_list()?;
        let mut presets = relock(&self.presets);
        presets.clear();
        presets.extend(list.into_iter().map(|p| (p.pk, p)));
        Some(StateEventKind::Presets)
    }

    fn replace_preset_states(&self, payload: &Value) -> Option<StateEventKind> {
        let list = PayloadKind::PresetStateList
            .decode(payload)
            .ok()?
            .into_preset_state_list()?;

        let digest = PlaybackEvent {
            playing: list.iter().filter(|s| s.is_playing).map(|s| s.pk).collect(),
            paused: list.iter().filter(|s| s.is_paused).map(|s| s.pk).collect(),
        };
        {
            let mut states = relock(&self.preset_states);
            states.clear();
            states.extend(list.into_iter().map(|s| (s.pk, s)));
        }
        self.notify_playback(&digest);
        Some(StateEventKind::PresetStates)
    }

    fn replace_assets(&self, payload: &Value) -> Option<StateEventKind> {
        let list = PayloadKind::AssetList
            .decode(payload)
            .ok()?
            .into_asset_list()?;
        let mut assets = relock(&self.assets);
        assets.clear();
        assets.extend(list.into_iter().map(|a| (a.file_name.clone(), a)));
        Some(StateEventKind::Assets)
    }

    fn replace_hardware(&self, payload: &Value) -> Option<StateEventKind> {
        let state = PayloadKind::HardwareState
            .decode(payload)
            .ok()?
            .into_hardware_state()?;
        *relock(&self.hardware) = Some(state);
        Some(StateEventKind::HardwareState)
    }

    fn upsert_time_code(&self, payload: &Value) -> Option<StateEventKind> {
        let code = PayloadKind::TimeCode
            .decode(payload)
            .ok()?
            .into_time_code()?;
        relock(&self.time_codes).insert(code.pk, code);
        Some(StateEventKind::TimeCodes)
    }

    fn upsert_asset(&self, payload: &Value) -> Option<StateEventKind> {
        let asset = PayloadKind::Asset.decode(payload).ok()?.into_asset()?;
        relock(&self.assets).insert(asset.file_name.clone(), asset);
        Some(StateEventKind::Assets)
    }

    fn delete_asset(&self, payload: &Value) -> Option<StateEventKind> {
        let file_name = PayloadKind::Text.decode(payload).ok()?.into_text()?;
        relock(&self.assets).remove(&file_name);
        Some(StateEventKind::Assets)
    }

    // ------------------------------------------------------------------------
    // Callbacks
    // ------------------------------------------------------------------------

    /// Register (or replace) the callback for one category. The swap is
    /// atomic: after this returns, the old callback will not fire again.
    pub fn on_state_event(&self, kind: StateEventKind, callback: StateCallback) {
        relock(&self.callbacks).insert(kind, callback);
    }

    /// Register (or replace) the playback activity callback, fired on every
    /// `PresetStates` snapshot.
    pub fn on_playback_event(&self, callback: PlaybackCallback) {
        *relock(&self.playback_callback) = Some(callback);
    }

    fn notify(&self, kind: StateEventKind) {
        // Clone out of the registry so the callback runs without any cache
        // lock held; a callback is free to read the cache again.
        let callback = relock(&self.callbacks).get(&kind).cloned();
        if let Some(callback) = callback {
            callback(kind);
        }
    }

    fn notify_playback(&self, digest: &PlaybackEvent) {
        let callback = relock(&self.playback_callback).clone();
        if let Some(callback) = callback {
            callback(digest);
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn time_code(&self, pk: PresetKey) -> Option<TimeCode> {
        relock(&self.time_codes).get(&pk).copied()
    }

    pub fn time_codes(&self) -> HashMap<PresetKey, TimeCode> {
        relock(&self.time_codes).clone()
    }

    pub fn preset(&self, pk: PresetKey) -> Option<Preset> {
        relock(&self.presets).get(&pk).cloned()
    }

    pub fn presets(&self) -> HashMap<PresetKey, Preset> {
        relock(&self.presets).clone()
    }

    pub fn preset_states(&self) -> HashMap<PresetKey, PresetState> {
        relock(&self.preset_states).clone()
    }

    pub fn asset(&self, file_name: &str) -> Option<Asset> {
        relock(&self.assets).get(file_name).cloned()
    }

    pub fn assets(&self) -> HashMap<String, Asset> {
        relock(&self.assets).clone()
    }

    pub fn hardware_state(&self) -> Option<HardwareState> {
        relock(&self.hardware).clone()
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

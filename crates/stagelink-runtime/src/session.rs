//! Deck sessions
//!
//! A [`Session`] is the synchronous face of one deck: every public method
//! sends a command, waits a bounded time for the correlated reply, and
//! returns a typed result. Behind it, the link supervisor's I/O thread
//! feeds replies into the ticket table and push events into the state
//! cache; callers never see a socket or a queue.
//!
//! Connection loss is absorbed lazily. A command finding the link down
//! first re-dials and re-registers (identity queries plus subscriptions),
//! bounded by `reconnect_attempts`. A deck that actively rejects
//! registration poisons the session instead: reconnection stops until the
//! caller builds a fresh session, because redialing a deck that refuses us
//! would loop forever.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use stagelink_core::config::SessionConfig;
use stagelink_core::envelope::{decode_inbound, encode_command, Envelope, Inbound};
use stagelink_core::errors::{Result, StagelinkError, TransportError};
use stagelink_core::framing::{encode_frame, Frame};
use stagelink_core::payload::{PayloadKind, PayloadValue};
use stagelink_core::records::{
    Asset, CanvasOrientation, HardwareState, MediaState, NetworkInfo, Preset, RefreshMode,
    ResolutionMode, TimeCode, UnitRole,
};
use stagelink_core::status::Status;
use stagelink_core::types::{LinkId, PresetKey};

use crate::cache::{PlaybackCallback, StateCache, StateCallback, StateEventKind};
use crate::supervisor::{LinkDownReason, LinkHandle, LinkHooks, SupervisorClient};
use crate::tickets::{MsgIdCounter, TicketTable, WaitOutcome};

// ----------------------------------------------------------------------------
// Command Results
// ----------------------------------------------------------------------------

/// A command the deck did not complete, carrying the status it answered
/// with (or the network-error status when no answer came at all).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{command} failed with status {status}: {text}")]
pub struct CommandError {
    pub command: String,
    pub status: Status,
    pub text: String,
}

impl CommandError {
    fn network(command: &str, text: impl Into<String>) -> Self {
        CommandError {
            command: command.to_string(),
            status: Status::NetworkError,
            text: text.into(),
        }
    }

    fn malformed(command: &str, detail: impl Into<String>) -> Self {
        CommandError::network(command, format!("malformed reply: {}", detail.into()))
    }
}

pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// What the deck reported about itself during registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckIdentity {
    pub unit_type: String,
    pub os_version: String,
    pub sinks: Vec<String>,
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

enum LinkState {
    Up(LinkHandle),
    Down,
    /// Registration was actively refused; automatic redialing is off.
    Poisoned,
}

/// Shared with the supervisor's I/O thread through the link hooks.
struct SessionCore {
    host: String,
    tickets: TicketTable,
    cache: StateCache,
    link: Mutex<LinkState>,
    /// Link currently mid-handshake, not yet promoted to `LinkState::Up`.
    dialing: Mutex<Option<LinkId>>,
    identity: Mutex<Option<DeckIdentity>>,
}

/// One deck connection with synchronous commands and a live state mirror.
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Session {
    config: SessionConfig,
    client: SupervisorClient,
    counter: MsgIdCounter,
    core: Arc<SessionCore>,
    reconnect_gate: Mutex<()>,
}

fn relock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Dial `host`, register with the deck, and subscribe to every state
    /// category. Blocks until the handshake completes or fails; must not
    /// be called from async context.
    pub fn connect(
        client: SupervisorClient,
        host: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Session> {
        let host = host.into();
        let session = Session {
            config,
            client,
            counter: MsgIdCounter::new(),
            core: Arc::new(SessionCore {
                host,
                tickets: TicketTable::new(),
                cache: StateCache::new(),
                link: Mutex::new(LinkState::Down),
                dialing: Mutex::new(None),
                identity: Mutex::new(None),
            }),
            reconnect_gate: Mutex::new(()),
        };
        session.establish()?;
        Ok(session)
    }

    /// Host this session dials.
    pub fn host(&self) -> &str {
        &self.core.host
    }

    /// Identity reported during the most recent successful registration.
    pub fn deck_identity(&self) -> Option<DeckIdentity> {
        relock(&self.core.identity).clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*relock(&self.core.link), LinkState::Up(_))
    }

    /// Live mirror of the subscribed deck state.
    pub fn cache(&self) -> &StateCache {
        &self.core.cache
    }

    /// Register a callback for one state category. Runs on the I/O thread;
    /// keep it short.
    pub fn on_state_event(&self, kind: StateEventKind, callback: StateCallback) {
        self.core.cache.on_state_event(kind, callback);
    }

    /// Register the playback activity callback, fired on every preset
    /// state snapshot.
    pub fn on_playback_event(&self, callback: PlaybackCallback) {
        self.core.cache.on_playback_event(callback);
    }

    /// Tear the link down. Outstanding waiters wake with a cancellation
    /// before any shared state is released.
    pub fn disconnect(&self) {
        let handle = {
            let mut link = relock(&self.core.link);
            match std::mem::replace(&mut *link, LinkState::Down) {
                LinkState::Up(handle) => Some(handle),
                LinkState::Poisoned => {
                    *link = LinkState::Poisoned;
                    None
                }
                LinkState::Down => None,
            }
        };
        self.core.tickets.cancel_all();
        if let Some(handle) = handle {
            handle.disconnect();
            info!(host = %self.core.host, "session disconnected");
        }
    }

    // ------------------------------------------------------------------------
    // Connection Management
    // ------------------------------------------------------------------------

    /// Dial and register, leaving the link up on success. Serious
    /// rejections poison the session.
    fn establish(&self) -> Result<LinkHandle> {
        // Anyone still parked from a previous link wakes before the next
        // handshake starts.
        self.core.tickets.cancel_all();

        let hooks: Arc<dyn LinkHooks> = Arc::clone(&self.core) as Arc<dyn LinkHooks>;
        let handle = self.client.connect(&self.core.host, hooks)?;
        *relock(&self.core.dialing) = Some(handle.id());

        let negotiated = self.negotiate(&handle);
        *relock(&self.core.dialing) = None;
        match negotiated {
            Ok(identity) => {
                info!(
                    host = %self.core.host,
                    unit_type = %identity.unit_type,
                    os_version = %identity.os_version,
                    sinks = identity.sinks.len(),
                    "deck registered"
                );
                *relock(&self.core.identity) = Some(identity);
                *relock(&self.core.link) = LinkState::Up(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                handle.disconnect();
                if e.is_serious() {
                    error!(host = %self.core.host, error = %e,
                        "registration rejected, automatic reconnection disabled");
                    *relock(&self.core.link) = LinkState::Poisoned;
                }
                Err(e)
            }
        }
    }

    /// First-contact sequence: identity queries, then one subscription per
    /// state category. Any refusal is a serious error.
    fn negotiate(&self, handle: &LinkHandle) -> Result<DeckIdentity> {
        let unit_type = self.handshake_text(handle, "GetUnitType")?;
        let os_version = self.handshake_text(handle, "GetOSVersion")?;

        let sinks_reply = self.handshake_exchange(handle, "GetSupportedSinks", None)?;
        let sinks = sinks_reply
            .payload
            .as_ref()
            .and_then(|raw| PayloadKind::TextList.decode(raw).ok())
            .and_then(PayloadValue::into_text_list)
            .ok_or_else(|| {
                StagelinkError::handshake_rejected(
                    &self.core.host,
                    "GetSupportedSinks",
                    "malformed sink list",
                )
            })?;

        for kind in StateEventKind::ALL {
            let args = map_args([("Event", Value::from(kind.wire_name()))]);
            self.handshake_exchange(handle, "Subscribe", Some(args))?;
        }

        Ok(DeckIdentity {
            unit_type,
            os_version,
            sinks,
        })
    }

    fn handshake_text(&self, handle: &LinkHandle, command: &str) -> Result<String> {
        let envelope = self.handshake_exchange(handle, command, None)?;
        envelope
            .payload
            .as_ref()
            .and_then(|raw| PayloadKind::Text.decode(raw).ok())
            .and_then(PayloadValue::into_text)
            .ok_or_else(|| {
                StagelinkError::handshake_rejected(
                    &self.core.host,
                    command,
                    "malformed identity payload",
                )
            })
    }

    /// One handshake round trip. A missing or network-error reply is a
    /// retryable transport failure; any other non-ok status is a serious
    /// rejection.
    fn handshake_exchange(
        &self,
        handle: &LinkHandle,
        command: &str,
        payload: Option<PayloadValue>,
    ) -> Result<Envelope> {
        let (status, envelope) =
            self.dispatch_on(handle, command, payload, self.config.command_timeout);
        match status {
            Status::Ok => envelope.ok_or_else(|| {
                StagelinkError::channel_error("ok reply vanished before delivery")
            }),
            Status::NetworkError => Err(StagelinkError::Transport(TransportError::ReceiveFailed {
                reason: format!("no usable reply to {command}"),
            })),
            other => Err(StagelinkError::handshake_rejected(
                &self.core.host,
                command,
                format!("status {other}"),
            )),
        }
    }

    /// Hand back a live link, redialing if the previous one died. Bounded
    /// by `reconnect_attempts`; a poisoned session refuses outright.
    fn ready_handle(&self) -> CommandResult<LinkHandle> {
        if let LinkState::Up(handle) = &*relock(&self.core.link) {
            return Ok(handle.clone());
        }

        // One thread redials while the rest queue here and re-check.
        let _gate = relock(&self.reconnect_gate);
        match &*relock(&self.core.link) {
            LinkState::Up(handle) => return Ok(handle.clone()),
            LinkState::Poisoned => {
                return Err(CommandError::network(
                    "Reconnect",
                    format!(
                        "deck {} rejected registration; reconnection disabled",
                        self.core.host
                    ),
                ))
            }
            LinkState::Down => {}
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            if let Some(limit) = self.config.reconnect_attempts {
                if attempt > limit {
                    warn!(host = %self.core.host, attempts = limit, "reconnection abandoned");
                    return Err(CommandError::network(
                        "Reconnect",
                        format!("no connection to {} after {limit} attempts", self.core.host),
                    ));
                }
            }
            info!(host = %self.core.host, attempt, "reconnecting");
            match self.establish() {
                Ok(handle) => return Ok(handle),
                Err(e) if e.is_serious() => {
                    return Err(CommandError::network("Reconnect", e.to_string()));
                }
                Err(e) => {
                    debug!(host = %self.core.host, attempt, error = %e, "reconnect attempt failed");
                    std::thread::sleep(self.config.reconnect_delay);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Send one command on the given link and wait for its reply. Never
    /// errors: connection problems, timeouts, and cancellations all come
    /// back as the network-error status with no envelope.
    fn dispatch_on(
        &self,
        handle: &LinkHandle,
        command: &str,
        payload: Option<PayloadValue>,
        timeout: Duration,
    ) -> (Status, Option<Envelope>) {
        match self.try_dispatch(handle, command, payload, timeout) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(command, error = %e, "command did not complete");
                (Status::NetworkError, None)
            }
        }
    }

    fn try_dispatch(
        &self,
        handle: &LinkHandle,
        command: &str,
        payload: Option<PayloadValue>,
        timeout: Duration,
    ) -> Result<(Status, Option<Envelope>)> {
        let id = self.counter.next();
        let ticket = self
            .core
            .tickets
            .new_ticket(id)
            .ok_or_else(|| StagelinkError::channel_error("correlation id collision"))?;

        let body = encode_command(command, id, payload.as_ref())?;
        let wire = encode_frame(&body)?;
        if let Err(e) = handle.enqueue_frame(wire) {
            self.core.tickets.discard(id);
            return Err(StagelinkError::Transport(e));
        }

        match ticket.wait(timeout) {
            WaitOutcome::Fulfilled(envelope) => Ok((envelope.status, Some(envelope))),
            WaitOutcome::TimedOut => {
                self.core.tickets.discard(id);
                warn!(command, %id, timeout_ms = timeout.as_millis() as u64, "command timed out");
                Ok((Status::NetworkError, None))
            }
            WaitOutcome::Cancelled => {
                self.core.tickets.discard(id);
                debug!(command, %id, "command cancelled by link teardown");
                Ok((Status::NetworkError, None))
            }
        }
    }

    /// Full command path: ensure a link, dispatch, map non-ok statuses to
    /// [`CommandError`].
    fn execute(&self, command: &str, payload: Option<PayloadValue>) -> CommandResult<Envelope> {
        let handle = self.ready_handle()?;
        let (status, envelope) =
            self.dispatch_on(&handle, command, payload, self.config.command_timeout);
        match status {
            Status::Ok => envelope
                .ok_or_else(|| CommandError::malformed(command, "ok reply carried no envelope")),
            other => Err(CommandError {
                command: command.to_string(),
                status: other,
                text: envelope
                    .map(|e| e.status_text)
                    .unwrap_or_else(|| "no reply".to_string()),
            }),
        }
    }

    /// Command that only signals success; any payload is ignored.
    fn execute_unit(&self, command: &str, payload: Option<PayloadValue>) -> CommandResult<()> {
        self.execute(command, payload).map(|_| ())
    }

    /// Command whose reply must carry a payload of the given kind.
    fn fetch<T>(
        &self,
        command: &str,
        payload: Option<PayloadValue>,
        kind: PayloadKind,
        pick: fn(PayloadValue) -> Option<T>,
    ) -> CommandResult<T> {
        let envelope = self.execute(command, payload)?;
        let raw = envelope
            .payload
            .ok_or_else(|| CommandError::malformed(command, "reply carried no data"))?;
        let value = kind
            .decode(&raw)
            .map_err(|e| CommandError::malformed(command, e.to_string()))?;
        pick(value).ok_or_else(|| CommandError::malformed(command, "unexpected payload shape"))
    }

    // ------------------------------------------------------------------------
    // Transport Commands
    // ------------------------------------------------------------------------

    /// Start playback. `PresetKey::SELECTED` takes whichever preset the
    /// deck has selected.
    pub fn take(&self, pk: PresetKey) -> CommandResult<()> {
        self.execute_unit("Take", Some(pk_args(pk)))
    }

    pub fn pause(&self, pk: PresetKey) -> CommandResult<()> {
        self.execute_unit("Pause", Some(pk_args(pk)))
    }

    pub fn resume(&self, pk: PresetKey) -> CommandResult<()> {
        self.execute_unit("Resume", Some(pk_args(pk)))
    }

    pub fn end(&self, pk: PresetKey) -> CommandResult<()> {
        self.execute_unit("End", Some(pk_args(pk)))
    }

    /// Jump playback of a preset to `time_index` milliseconds.
    pub fn seek_to(&self, pk: PresetKey, time_index: u32) -> CommandResult<()> {
        let args = map_args([
            ("PK", Value::from(pk.get())),
            ("TimeIndex", Value::from(time_index)),
        ]);
        self.execute_unit("SeekTo", Some(args))
    }

    // ------------------------------------------------------------------------
    // Selection Commands
    // ------------------------------------------------------------------------

    pub fn select_preset(&self, pk: PresetKey) -> CommandResult<()> {
        self.execute_unit("SelectPreset", Some(pk_args(pk)))
    }

    pub fn select_next(&self) -> CommandResult<()> {
        self.execute_unit("SelectNext", None)
    }

    pub fn select_prev(&self) -> CommandResult<()> {
        self.execute_unit("SelectPrev", None)
    }

    pub fn take_next(&self) -> CommandResult<()> {
        self.execute_unit("TakeNext", None)
    }

    pub fn take_prev(&self) -> CommandResult<()> {
        self.execute_unit("TakePrev", None)
    }

    // ------------------------------------------------------------------------
    // Preset Management
    // ------------------------------------------------------------------------

    /// Authoritative preset list straight from the deck. The cached copy
    /// in [`Session::cache`] refreshes on push events instead.
    pub fn presets(&self) -> CommandResult<Vec<Preset>> {
        self.fetch(
            "GetPresets",
            None,
            PayloadKind::PresetList,
            PayloadValue::into_preset_list,
        )
    }

    pub fn create_preset(&self, preset: &Preset) -> CommandResult<()> {
        self.execute_unit("CreatePreset", Some(PayloadValue::Preset(preset.clone())))
    }

    pub fn update_preset(&self, preset: &Preset) -> CommandResult<()> {
        self.execute_unit("UpdatePreset", Some(PayloadValue::Preset(preset.clone())))
    }

    pub fn delete_preset(&self, pk: PresetKey) -> CommandResult<()> {
        self.execute_unit("DeletePreset", Some(pk_args(pk)))
    }

    /// Swap the deck-side ordering of two presets.
    pub fn reorder_presets(&self, first: PresetKey, second: PresetKey) -> CommandResult<()> {
        let args = map_args([
            ("PK1", Value::from(first.get())),
            ("PK2", Value::from(second.get())),
        ]);
        self.execute_unit("ReorderPresets", Some(args))
    }

    // ------------------------------------------------------------------------
    // Asset Commands
    // ------------------------------------------------------------------------

    pub fn assets(&self) -> CommandResult<Vec<Asset>> {
        self.fetch(
            "GetAssets",
            None,
            PayloadKind::AssetList,
            PayloadValue::into_asset_list,
        )
    }

    /// Start copying a media file onto the deck. Progress arrives through
    /// `AssetPost` push events.
    pub fn install_asset(&self, path: &str) -> CommandResult<()> {
        self.execute_unit("InstallAsset", Some(map_args([("FileName", Value::from(path))])))
    }

    pub fn delete_asset(&self, file_name: &str) -> CommandResult<()> {
        self.execute_unit(
            "DeleteAsset",
            Some(map_args([("FileName", Value::from(file_name))])),
        )
    }

    pub fn rename_asset(&self, current: &str, new_name: &str) -> CommandResult<()> {
        let args = map_args([
            ("CurrentName", Value::from(current)),
            ("NewName", Value::from(new_name)),
        ]);
        self.execute_unit("RenameAsset", Some(args))
    }

    // ------------------------------------------------------------------------
    // Deck State
    // ------------------------------------------------------------------------

    pub fn media_state(&self) -> CommandResult<MediaState> {
        self.fetch(
            "GetMediaState",
            None,
            PayloadKind::MediaState,
            PayloadValue::into_media_state,
        )
    }

    pub fn hardware_state(&self) -> CommandResult<HardwareState> {
        self.fetch(
            "GetHardwareState",
            None,
            PayloadKind::HardwareState,
            PayloadValue::into_hardware_state,
        )
    }

    /// Latest pushed time code for a preset, served from the mirror
    /// without a round trip.
    pub fn time_code(&self, pk: PresetKey) -> Option<TimeCode> {
        self.core.cache.time_code(pk)
    }

    // ------------------------------------------------------------------------
    // Unit Administration
    // ------------------------------------------------------------------------

    pub fn network_info(&self, adapter_id: i32) -> CommandResult<NetworkInfo> {
        self.fetch(
            "GetIP",
            Some(map_args([("AdapterID", Value::from(adapter_id))])),
            PayloadKind::NetworkInfo,
            PayloadValue::into_network_info,
        )
    }

    pub fn set_network_info(&self, info: &NetworkInfo) -> CommandResult<()> {
        self.execute_unit("SetIP", Some(PayloadValue::NetworkInfo(info.clone())))
    }

    pub fn disks(&self) -> CommandResult<Vec<String>> {
        self.fetch(
            "GetDisks",
            None,
            PayloadKind::TextList,
            PayloadValue::into_text_list,
        )
    }

    pub fn eject_disk(&self, drive: &str) -> CommandResult<()> {
        self.execute_unit("EjectDisk", Some(map_args([("DriveLetter", Value::from(drive))])))
    }

    pub fn server_version(&self) -> CommandResult<String> {
        self.fetch(
            "GetServerVersion",
            None,
            PayloadKind::Text,
            PayloadValue::into_text,
        )
    }

    pub fn set_hardware_mode(
        &self,
        resolution: ResolutionMode,
        refresh_rate: RefreshMode,
    ) -> CommandResult<()> {
        let args = map_args([
            ("Resolution", Value::from(i32::from(resolution))),
            ("RefreshRate", Value::from(i32::from(refresh_rate))),
        ]);
        self.execute_unit("SetHardwareMode", Some(args))
    }

    pub fn canvas_orientation(&self) -> CommandResult<CanvasOrientation> {
        self.fetch(
            "GetCanvasOrientation",
            None,
            PayloadKind::Orientation,
            PayloadValue::into_orientation,
        )
    }

    pub fn set_canvas_orientation(&self, orientation: CanvasOrientation) -> CommandResult<()> {
        self.execute_unit(
            "SetCanvasOrientation",
            Some(PayloadValue::Orientation(orientation)),
        )
    }

    pub fn unit_role(&self) -> CommandResult<UnitRole> {
        self.fetch("GetUnitRole", None, PayloadKind::Integer, |value| {
            value.into_integer().map(|raw| UnitRole::from(raw as i32))
        })
    }

    pub fn set_unit_role(&self, role: UnitRole) -> CommandResult<()> {
        self.execute_unit(
            "SetUnitRole",
            Some(map_args([("Role", Value::from(i32::from(role)))])),
        )
    }

    pub fn restart_service(&self) -> CommandResult<()> {
        self.execute_unit("RestartService", None)
    }

    pub fn reboot_unit(&self) -> CommandResult<()> {
        self.execute_unit("RebootUnit", None)
    }

    pub fn soft_reboot_unit(&self) -> CommandResult<()> {
        self.execute_unit("SoftRebootUnit", None)
    }

    pub fn shutdown_unit(&self) -> CommandResult<()> {
        self.execute_unit("ShutdownUnit", None)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ----------------------------------------------------------------------------
// Link Hooks
// ----------------------------------------------------------------------------

impl LinkHooks for SessionCore {
    fn on_frame(&self, frame: Frame) {
        match decode_inbound(frame.body()) {
            Ok(Inbound::Reply(envelope)) => {
                let id = envelope.msg_id;
                if !self.tickets.fulfill(id, envelope) {
                    // Stale reply after a timeout or cancellation; its
                    // waiter already gave up.
                    debug!(%id, "unclaimed reply dropped");
                }
            }
            Ok(Inbound::Event { name, payload }) => {
                self.cache.apply_event(&name, &payload);
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "undecodable inbound frame dropped");
            }
        }
    }

    fn on_link_down(&self, id: LinkId, reason: LinkDownReason) {
        let owned = {
            let mut link = relock(&self.link);
            match &*link {
                LinkState::Up(handle) if handle.id() == id => {
                    *link = LinkState::Down;
                    true
                }
                _ => false,
            }
        };
        let mid_handshake = *relock(&self.dialing) == Some(id);

        // A notice from an older, already-replaced link must not wake
        // waiters riding the current one.
        if owned || mid_handshake {
            self.tickets.cancel_all();
            info!(host = %self.host, %id, ?reason, "session link down");
        } else {
            debug!(host = %self.host, %id, ?reason, "stale link-down notice ignored");
        }
    }
}

// ----------------------------------------------------------------------------
// Argument Helpers
// ----------------------------------------------------------------------------

fn map_args<I>(pairs: I) -> PayloadValue
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    let map: Map<String, Value> = pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    PayloadValue::Map(map)
}

fn pk_args(pk: PresetKey) -> PayloadValue {
    map_args([("PK", Value::from(pk.get()))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagelink_core::types::MsgId;

    #[test]
    fn test_command_error_display() {
        let err = CommandError {
            command: "Take".into(),
            status: Status::Failed,
            text: "no such preset".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Take"));
        assert!(text.contains("no such preset"));
    }

    #[test]
    fn test_map_args_builds_wire_shape() {
        let args = pk_args(PresetKey::new(5));
        assert_eq!(args.to_wire().unwrap(), serde_json::json!({ "PK": 5 }));

        let args = map_args([
            ("PK", Value::from(2)),
            ("TimeIndex", Value::from(1500u32)),
        ]);
        assert_eq!(
            args.to_wire().unwrap(),
            serde_json::json!({ "PK": 2, "TimeIndex": 1500 })
        );
    }

    #[test]
    fn test_network_error_helper_carries_status() {
        let err = CommandError::network("SelectNext", "no reply");
        assert_eq!(err.status, Status::NetworkError);
        assert_eq!(err.command, "SelectNext");
    }

    // MsgId is produced by the session counter and threaded through every
    // dispatch; make sure the fire-and-forget sentinel stays unused.
    #[test]
    fn test_counter_never_yields_fire_and_forget() {
        let counter = MsgIdCounter::new();
        for _ in 0..64 {
            assert_ne!(counter.next(), MsgId::FIRE_AND_FORGET);
        }
    }
}

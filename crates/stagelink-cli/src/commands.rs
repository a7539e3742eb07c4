//! Subcommand execution
//!
//! Every deck subcommand spins up one supervisor, connects one session,
//! runs its queries, and lets Drop tear the link down. `discover` needs no
//! session at all; `watch` parks forever and leaves the interrupt to end
//! the process.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use stagelink_core::config::{DiscoveryConfig, LinkConfig, SessionConfig};
use stagelink_core::types::PresetKey;
use stagelink_runtime::cache::StateEventKind;
use stagelink_runtime::discovery::DiscoveryListener;
use stagelink_runtime::session::Session;
use stagelink_runtime::supervisor::LinkSupervisor;

use crate::cli::Commands;

pub fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Discover { listen_secs } => discover(listen_secs),
        Commands::Info { host } => info(&connect(&host)?),
        Commands::Presets { host } => presets(&connect(&host)?),
        Commands::Assets { host } => assets(&connect(&host)?),
        Commands::Take { host, pk } => {
            connect(&host)?.session.take(PresetKey::new(pk))?;
            println!("took preset {pk}");
            Ok(())
        }
        Commands::Pause { host, pk } => {
            connect(&host)?.session.pause(PresetKey::new(pk))?;
            println!("paused preset {pk}");
            Ok(())
        }
        Commands::End { host, pk } => {
            connect(&host)?.session.end(PresetKey::new(pk))?;
            println!("ended preset {pk}");
            Ok(())
        }
        Commands::Watch { host } => watch(connect(&host)?),
    }
}

// ----------------------------------------------------------------------------
// Session Setup
// ----------------------------------------------------------------------------

struct Deck {
    // Keeps the I/O thread alive for as long as the session runs.
    _supervisor: LinkSupervisor,
    session: Session,
}

fn connect(host: &str) -> Result<Deck> {
    let supervisor = LinkSupervisor::spawn_ws(LinkConfig::default())?;
    let client = supervisor.client();
    let session = Session::connect(client, host, SessionConfig::default())
        .with_context(|| format!("connecting to deck {host}"))?;
    Ok(Deck {
        _supervisor: supervisor,
        session,
    })
}

// ----------------------------------------------------------------------------
// Subcommands
// ----------------------------------------------------------------------------

fn discover(listen_secs: u64) -> Result<()> {
    let listener = DiscoveryListener::spawn(DiscoveryConfig::default())?;
    println!(
        "listening for deck announcements on UDP {} for {listen_secs}s...",
        listener.local_port()
    );
    std::thread::sleep(Duration::from_secs(listen_secs));

    let peers = listener.known_peers();
    listener.shutdown();
    if peers.is_empty() {
        println!("no decks announced themselves");
        return Ok(());
    }
    println!(
        "{:<20} {:<16} {:<8} {:<6} GUID",
        "NICKNAME", "ADDRESS", "ROLE", "API"
    );
    for peer in peers {
        println!(
            "{:<20} {:<16} {:<8} {:<6} {}",
            peer.nickname,
            peer.address,
            peer.role.to_string(),
            peer.api_version,
            peer.guid
        );
    }
    Ok(())
}

fn info(deck: &Deck) -> Result<()> {
    let identity = deck
        .session
        .deck_identity()
        .context("deck identity missing after handshake")?;
    let server_version = deck.session.server_version()?;
    let media = deck.session.media_state()?;

    println!("unit type:      {}", identity.unit_type);
    println!("os version:     {}", identity.os_version);
    println!("server version: {server_version}");
    println!("sinks:          {}", identity.sinks.join(", "));
    println!("presets:        {}", media.num_presets);
    println!("selected:       PK {}", media.selected_preset);
    if !media.playing_presets.is_empty() {
        println!("playing:        {}", join_keys(&media.playing_presets));
    }
    if !media.paused_presets.is_empty() {
        println!("paused:         {}", join_keys(&media.paused_presets));
    }
    Ok(())
}

fn presets(deck: &Deck) -> Result<()> {
    let mut presets = deck.session.presets()?;
    presets.sort_by_key(|preset| preset.index);

    println!("{:>6}  {:<24} {:<5} NOTES", "PK", "NAME", "LOOP");
    for preset in presets {
        println!(
            "{:>6}  {:<24} {:<5} {}",
            preset.pk.get(),
            preset.name,
            if preset.loop_mode { "yes" } else { "no" },
            preset.notes
        );
    }
    Ok(())
}

fn assets(deck: &Deck) -> Result<()> {
    let mut assets = deck.session.assets()?;
    assets.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    println!("{:<40} {:>5}  READY", "FILE", "COPY%");
    for asset in assets {
        println!(
            "{:<40} {:>5}  {}",
            asset.file_name,
            asset.copy_percentage,
            if asset.is_ready { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn watch(deck: Deck) -> Result<()> {
    let Deck {
        _supervisor,
        session,
    } = deck;
    let session = Arc::new(session);

    // The cache holds these callbacks for the session's whole life, so a
    // strong capture here would keep the session alive through its own
    // cache. Weak breaks the loop.
    for kind in StateEventKind::ALL {
        let observer = Arc::downgrade(&session);
        session.on_state_event(
            kind,
            Arc::new(move |kind| {
                if let Some(session) = observer.upgrade() {
                    print_delta(&session, kind);
                }
            }),
        );
    }
    session.on_playback_event(Arc::new(|event| {
        println!(
            "playback: playing [{}] paused [{}]",
            join_keys(&event.playing),
            join_keys(&event.paused)
        );
    }));

    println!("watching {}; Ctrl-C to stop", session.host());
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}

// Callbacks run on the supervisor's I/O thread; keep each to one line of
// output.
fn print_delta(session: &Session, kind: StateEventKind) {
    let cache = session.cache();
    match kind {
        StateEventKind::TimeCodes => {
            let mut codes: Vec<_> = cache.time_codes().into_values().collect();
            codes.sort_by_key(|code| code.pk.get());
            let ticks: Vec<String> = codes
                .iter()
                .map(|code| format!("{}:{}ms", code.pk, code.time))
                .collect();
            println!("timecode: {}", ticks.join("  "));
        }
        StateEventKind::Presets => {
            println!("presets: {} stored", cache.presets().len());
        }
        // The playback digest already covers preset state flips.
        StateEventKind::PresetStates => {}
        StateEventKind::Assets => {
            let assets = cache.assets();
            let ready = assets.values().filter(|asset| asset.is_ready).count();
            println!("assets: {} total, {ready} ready", assets.len());
        }
        StateEventKind::HardwareState => {
            if let Some(hw) = cache.hardware_state() {
                println!(
                    "hardware: {} {:?} {:?} {:?}",
                    hw.unit_type, hw.resolution, hw.refresh_rate, hw.current_mode
                );
            }
        }
    }
}

fn join_keys(keys: &[PresetKey]) -> String {
    let keys: Vec<String> = keys.iter().map(|pk| pk.to_string()).collect();
    keys.join(", ")
}

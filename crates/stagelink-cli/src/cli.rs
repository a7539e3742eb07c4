//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stagelink", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Listen for deck announcements and print the roster
    Discover {
        /// How long to collect announcements before printing
        #[arg(short, long, default_value_t = 3)]
        listen_secs: u64,
    },
    /// Show deck identity and playback summary
    Info {
        /// Deck host, `host` or `host:port`
        host: String,
    },
    /// List stored presets
    Presets {
        host: String,
    },
    /// List media assets
    Assets {
        host: String,
    },
    /// Start playback of a preset (PK 0 takes the selected one)
    Take {
        host: String,
        pk: i32,
    },
    /// Pause playback of a preset
    Pause {
        host: String,
        pk: i32,
    },
    /// Stop playback of a preset
    End {
        host: String,
        pk: i32,
    },
    /// Mirror deck state events to stdout until interrupted
    Watch {
        host: String,
    },
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "embraceu")]
#[command(about = "Save wellness entries with offline support and replay the queue")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding the local offline store
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a record, queueing it when the remote is unreachable
    Save {
        /// Destination table (mood_entries, gratitude_entries, ...)
        table: String,
        /// Record as a JSON object
        data: String,
        /// Skip the remote and queue directly
        #[arg(long)]
        offline: bool,
    },
    /// Replay queued entries once
    Sync {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show connectivity and queue state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List pending entries
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or recover entries that exhausted their retries
    DeadLetters {
        #[command(subcommand)]
        command: DeadLetterCommands,
    },
    /// Probe connectivity and sync on every reconnect until Ctrl-C
    Watch {
        /// Seconds between connectivity probes (overrides config)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum DeadLetterCommands {
    /// List dead-lettered entries
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move dead letters back to the end of the queue
    Requeue,
    /// Delete all dead letters
    Discard,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Supabase project URL
        #[arg(long)]
        supabase_url: Option<String>,
        /// Supabase anon key
        #[arg(long)]
        supabase_anon_key: Option<String>,
        /// URL probed for connectivity (defaults to the REST root)
        #[arg(long)]
        probe_url: Option<String>,
        /// Seconds between connectivity probes
        #[arg(long, value_name = "SECS")]
        probe_interval: Option<u64>,
        /// Failed replays before an entry is dead-lettered (0 retries forever)
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

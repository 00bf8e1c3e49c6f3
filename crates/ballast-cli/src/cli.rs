use std::path::PathBuf;

use ballast_core::{MassUnit, StorageKind};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ballast")]
#[command(about = "Track body mass offline and sync it when you can")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding the local store
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Path to the CLI config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log a measurement
    #[command(alias = "log")]
    Add {
        /// Measured mass
        mass: f64,
        /// Unit (defaults to the profile preference)
        #[arg(short, long, value_enum)]
        unit: Option<UnitArg>,
        /// Optional note
        #[arg(short, long)]
        note: Option<String>,
        /// Tag (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// When it was measured (defaults to now)
        #[arg(long, value_name = "WHEN")]
        at: Option<String>,
    },
    /// List recent entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Only entries of this profile
        #[arg(long, value_name = "ID")]
        profile: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing entry
    Edit {
        /// Entry ID or unique ID prefix
        id: String,
        #[arg(long)]
        mass: Option<f64>,
        #[arg(short, long, value_enum)]
        unit: Option<UnitArg>,
        #[arg(short, long, conflicts_with = "clear_note")]
        note: Option<String>,
        #[arg(long)]
        clear_note: bool,
        /// Replace tags (repeatable)
        #[arg(short, long = "tag", value_name = "TAG", conflicts_with = "clear_tags")]
        tags: Vec<String>,
        #[arg(long)]
        clear_tags: bool,
        #[arg(long, value_name = "WHEN")]
        at: Option<String>,
    },
    /// Delete an entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Show intents waiting to be synced
    Queue {
        #[arg(short, long, default_value = "25")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay pending changes against the remote service
    Sync {
        /// Bearer token (defaults to BALLAST_TOKEN)
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload every local entry straight to the remote service
    Seed {
        /// Bearer token (defaults to BALLAST_TOKEN)
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync on startup, on reconnect and on a timer until interrupted
    Watch {
        /// Bearer token (defaults to BALLAST_TOKEN)
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Override the poll interval
        #[arg(long, value_name = "SECONDS")]
        interval: Option<u64>,
    },
    /// Show or update the local profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show or update app settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Show or initialize CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Export entries
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum UnitArg {
    Kg,
    Lb,
}

impl From<UnitArg> for MassUnit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Kg => Self::Kg,
            UnitArg::Lb => Self::Lb,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StorageArg {
    Auto,
    Sqlite,
    Blob,
}

impl From<StorageArg> for StorageKind {
    fn from(value: StorageArg) -> Self {
        match value {
            StorageArg::Auto => Self::Auto,
            StorageArg::Sqlite => Self::Sqlite,
            StorageArg::Blob => Self::Blob,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show the profile
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Update profile fields (empty text clears a field)
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,
        /// Goal mass in the preferred unit
        #[arg(long)]
        goal: Option<f64>,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Show settings
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Update settings
    Set {
        #[arg(long)]
        auto_sync: Option<bool>,
        #[arg(long)]
        reminders: Option<bool>,
        /// Reminder hour (0-23)
        #[arg(long)]
        reminder_hour: Option<u8>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Initialize or update the config file
    Init {
        /// Remote API base URL
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Intents replayed per sync run
        #[arg(long)]
        page_size: Option<usize>,
        /// Seconds between scheduled runs
        #[arg(long, value_name = "SECONDS")]
        poll_interval: Option<u64>,
        /// Skip sync runs when no token is available
        #[arg(long)]
        require_auth: Option<bool>,
        /// Storage backend
        #[arg(long, value_enum)]
        storage: Option<StorageArg>,
    },
}

//! Clap derive structures for the `afero` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. This
//! file is also compiled by `build.rs` for man page generation, so it
//! must only depend on `clap` and `clap_complete`.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// afero -- watch and control Afero cloud devices from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "afero",
    version,
    about = "Watch and control Afero cloud devices (Hubspace, Myko)",
    long_about = "Polls the Afero cloud for every device on an account, keeps a typed\n\
        view of lights, locks, switches, fans and valves in sync, and sends\n\
        state writes with optimistic updates.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "AFERO_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Bearer token (overrides the profile's credential chain)
    #[arg(long, env = "AFERO_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Afero deployment the account lives on
    #[arg(long, env = "AFERO_CLIENT", global = true)]
    pub client: Option<ClientArg>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "AFERO_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "AFERO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Polling interval (e.g. "30s", "2m")
    #[arg(long, env = "AFERO_INTERVAL", global = true)]
    pub interval: Option<String>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ClientArg {
    Hubspace,
    Myko,
}

impl ClientArg {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hubspace => "hubspace",
            Self::Myko => "myko",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Light,
    Lock,
    Switch,
    Fan,
    Valve,
    /// Any other device class (hubs, thermostats, sensors)
    Device,
}

impl CategoryArg {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Lock => "lock",
            Self::Switch => "switch",
            Self::Fan => "fan",
            Self::Valve => "valve",
            Self::Device => "device",
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List tracked devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Stream device events until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Write one state value to a device
    Set(SetArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Only show devices of this category
    #[arg(long, short = 'c')]
    pub category: Option<CategoryArg>,

    /// Show a single device by ID
    #[arg(long)]
    pub id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only show events for this category
    #[arg(long, short = 'c')]
    pub category: Option<CategoryArg>,

    /// Print the current device list before streaming
    #[arg(long)]
    pub initial: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SET
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device ID
    pub device: String,

    /// Function class (e.g. "power", "brightness", "fan-speed")
    pub function_class: String,

    /// Value; parsed as JSON when possible, otherwise sent as a string
    pub value: String,

    /// Function instance (e.g. "light-power", "spigot-1")
    #[arg(long, short = 'i')]
    pub instance: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration (tokens redacted)
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Create or update a profile
    AddProfile {
        /// Profile name
        name: String,

        /// Afero deployment
        #[arg(long, default_value = "hubspace")]
        client: ClientArg,

        /// Read the token from this environment variable
        #[arg(long)]
        token_env: Option<String>,

        /// Polling interval in seconds
        #[arg(long)]
        polling_interval: Option<u64>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a token in the system keyring
    SetToken {
        /// Token value
        token: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

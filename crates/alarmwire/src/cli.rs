//! Clap derive structures for the `alarmwire` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace crates so `build.rs` can render man pages from it.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// alarmwire -- live alarm stream client for plant dashboards
#[derive(Debug, Parser)]
#[command(
    name = "alarmwire",
    version,
    about = "Watch and act on live plant alarms from the command line",
    long_about = "Connects to an alarm server's push channel, keeps live active/critical\n\
        counts and a paged alarm list in step with the stream, and lets operators\n\
        acknowledge, clear, or raise test alarms.",
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
#[allow(clippy::struct_excessive_bools)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "ALARMWIRE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Dashboard origin URL (fallback for API and push endpoints)
    #[arg(long, env = "ALARMWIRE_ORIGIN", global = true)]
    pub origin: Option<String>,

    /// REST API base URL
    #[arg(long, env = "ALARMWIRE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Push channel URL (ws:// or wss://)
    #[arg(long, env = "ALARMWIRE_PUSH_URL", global = true)]
    pub push_url: Option<String>,

    /// Tenant whose alarm channel to join
    #[arg(long, short = 't', env = "ALARMWIRE_TENANT", global = true)]
    pub tenant: Option<i64>,

    /// Bearer token
    #[arg(long, env = "ALARMWIRE_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ALARMWIRE_OUTPUT",
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

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ALARMWIRE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "ALARMWIRE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    /// Whether any endpoint was given on the command line or environment.
    pub fn has_endpoint(&self) -> bool {
        self.origin.is_some() || self.api_url.is_some() || self.push_url.is_some()
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeverityArg {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    Inactive,
    Active,
    Acknowledged,
    Cleared,
    Suppressed,
    Shelved,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live alarms with running counts
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// List, acknowledge and clear alarms
    #[command(alias = "a")]
    Alarms(AlarmsArgs),

    /// Ask the server to raise a test alarm
    TestAlarm,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared filter arguments ──────────────────────────────────────────

/// Alarm list filter shared by `watch` and `alarms list`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only this severity
    #[arg(long, conflicts_with = "min_severity")]
    pub severity: Option<SeverityArg>,

    /// This severity or worse
    #[arg(long)]
    pub min_severity: Option<SeverityArg>,

    /// Only alarms in this state
    #[arg(long)]
    pub state: Option<StateArg>,

    /// Case-insensitive substring of the alarm message
    #[arg(long, short = 's')]
    pub search: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Rows per page of the live view
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=500))]
    pub page_size: Option<u32>,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Ring the terminal bell on every new alarm
    #[arg(long)]
    pub bell: bool,

    /// Print the visible page whenever it changes
    #[arg(long)]
    pub show_page: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ALARMS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AlarmsArgs {
    #[command(subcommand)]
    pub command: AlarmsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AlarmsCommand {
    /// List open alarms
    #[command(alias = "ls")]
    List {
        /// Page number (1-based)
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Rows per page (overrides profile)
        #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(1..=500))]
        limit: Option<u32>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Acknowledge an alarm occurrence
    Ack {
        /// Occurrence ID
        id: i64,

        /// Comment recorded with the acknowledgment
        #[arg(long, short = 'm')]
        comment: Option<String>,
    },

    /// Clear an alarm occurrence
    Clear {
        /// Occurrence ID
        id: i64,

        /// Comment recorded with the clear
        #[arg(long, short = 'm')]
        comment: Option<String>,
    },
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
    /// Display the current configuration
    Show,

    /// Print the config file path
    Path,

    /// Set a value on the active profile
    Set {
        /// Profile key (e.g. "origin", "tenant_id", "page_size")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a bearer token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
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

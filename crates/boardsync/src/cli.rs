//! Clap derive structures for the `boardsync` CLI.
//!
//! Defines the command tree, global flags, and shared output types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// boardsync -- realtime kanban boards from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "boardsync",
    version,
    about = "Show, watch and edit kanban boards from the command line",
    long_about = "A command-line client for realtime kanban boards.\n\n\
        Moves are applied optimistically, confirmed over REST and announced\n\
        to every other client watching the same board.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "BOARDSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "BOARDSYNC_SERVER", global = true)]
    pub server: Option<String>,

    /// Board id (overrides profile)
    #[arg(long, short = 'b', env = "BOARDSYNC_BOARD", global = true)]
    pub board: Option<String>,

    /// API token
    #[arg(long, env = "BOARDSYNC_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BOARDSYNC_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "BOARDSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "BOARDSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Do not connect the realtime socket
    #[arg(long, global = true)]
    pub no_sync: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

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

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show or watch a board
    Board(BoardArgs),

    /// Move, create and delete issues
    #[command(alias = "i")]
    Issue(IssueArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Board ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct BoardArgs {
    #[command(subcommand)]
    pub command: BoardCommand,
}

#[derive(Debug, Subcommand)]
pub enum BoardCommand {
    /// Print the board once
    Show {
        /// Only list issues in this column (id, name or status key)
        #[arg(long)]
        column: Option<String>,
    },

    /// Follow the board, printing it again after every change
    Watch,
}

// ── Issue ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct IssueArgs {
    #[command(subcommand)]
    pub command: IssueCommand,
}

#[derive(Debug, Subcommand)]
pub enum IssueCommand {
    /// List issues in board order
    #[command(alias = "ls")]
    List {
        /// Only list issues in this column (id, name or status key)
        #[arg(long)]
        column: Option<String>,
    },

    /// Show one issue
    Get {
        /// Issue key (e.g. PRJ-42) or id
        issue: String,
    },

    /// Move an issue to another column
    #[command(alias = "mv")]
    Move {
        /// Issue key (e.g. PRJ-42) or id
        issue: String,

        /// Target column (id, name or status key)
        column: String,
    },

    /// Create an issue in the board's project
    Create {
        /// Issue title
        title: String,
    },

    /// Delete an issue
    #[command(alias = "rm")]
    Delete {
        /// Issue key (e.g. PRJ-42) or id
        issue: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Set a value on the active profile
    Set {
        /// Profile key (server, board, token_env, ca_cert, insecure, timeout)
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

    /// Store an API token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

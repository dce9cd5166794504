use clap::{Parser, Subcommand};
use credpool_core::types::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "credpool")]
#[command(about = "Credential pool: round-robin API key rotation with per-key rate limits")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// State directory holding the pool (defaults to the XDG state dir)
    #[arg(long, global = true, env = "CREDPOOL_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.config/credpool/config.toml)
    #[arg(long, global = true, env = "CREDPOOL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a credential to the end of the rotation
    Add {
        /// Credential to add (surrounding whitespace is ignored)
        key: String,
    },

    /// Remove a credential from the pool
    Remove { key: String },

    /// List credentials in rotation order
    List {
        /// Print full credentials instead of masked ones
        #[arg(long)]
        reveal: bool,
    },

    /// Print the next usable credential (exit 2 when none is available)
    Next {
        /// Record a usage for the returned credential immediately
        #[arg(long)]
        record: bool,
    },

    /// Record one dispatched request for a credential
    Record { key: String },

    /// Show per-credential usage within the current window
    Status,

    /// Check a credential's format without adding it
    Validate { key: String },

    /// Remove the pool, cursor and usage history
    Clear,

    /// Classify an error message returned by the external API
    Classify {
        /// Error message text, as returned by the failed request
        message: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

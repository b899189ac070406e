//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ferry - content-addressed fetch-and-cache service
///
/// Fetches registry manifests by digest into a shared local store,
/// verifying each against its digest before publishing it.
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FERRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Content store root (overrides store.root)
    #[arg(short, long, global = true, env = "FERRY_STORE")]
    pub store: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every requested digest missing from the store
    Fetch(FetchArgs),

    /// Check whether a digest is present (exit status 0 if so)
    Exists(ExistsArgs),

    /// List committed entries
    List(ListArgs),

    /// Re-verify committed entries against their digests
    Verify(VerifyArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// JSON request file mapping digest -> descriptor
    pub requests: PathBuf,

    /// Parallel retrievals (default: from config)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-retrieval timeout in seconds (default: from config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the exists command
#[derive(Parser, Debug)]
pub struct ExistsArgs {
    /// Digest to look up (e.g. sha256:...)
    pub digest: String,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Digests to verify (default: every entry)
    pub digests: Vec<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Dot-separated key (e.g. fetch.workers)
        key: String,

        /// Value to set
        value: String,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

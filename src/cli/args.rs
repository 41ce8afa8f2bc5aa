//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// bookpub - render git-hosted books on demand
///
/// Resolves a repository spec, fetches and builds the book once per
/// base URL, and serves the static site over HTTP.
#[derive(Parser, Debug)]
#[command(name = "bookpub")]
#[command(author, version, about = "Render git-hosted books on demand", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BOOKPUB_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),

    /// Resolve a spec once and print the answer
    Resolve(ResolveArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Inspect and purge checkouts and built sites
    Cache(CacheArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "BOOKPUB_PORT")]
    pub port: Option<u16>,

    /// Directory holding repository checkouts
    #[arg(long, env = "BOOKPUB_CHECKOUT_ROOT")]
    pub checkout_root: Option<PathBuf>,

    /// Directory holding built sites
    #[arg(long, env = "BOOKPUB_BUILT_SITES_ROOT")]
    pub built_sites_root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Repository spec, e.g. github.com/org/repo
    pub spec: String,

    /// Also print the cache keys for a build at this base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
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

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List checkouts and built sites
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove entries not touched for a while
    Gc {
        /// Remove entries older than N days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear caches
    #[command(group(clap::ArgGroup::new("target").required(true).args(["checkouts", "sites", "all"])))]
    Clear {
        /// Clear repository checkouts
        #[arg(long)]
        checkouts: bool,

        /// Clear built sites
        #[arg(long)]
        sites: bool,

        /// Clear everything (checkouts + sites)
        #[arg(long, conflicts_with_all = ["checkouts", "sites"])]
        all: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

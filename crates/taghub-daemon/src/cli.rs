//! CLI argument parsing for the taghub daemon.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Tag-index hub daemon
///
/// Runs the scheduled accessibility probe, sweep and maintenance jobs over
/// the article store, and offers admin commands for manual runs.
#[derive(Parser, Debug)]
#[command(name = "taghub-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/taghub/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the daemon and its scheduled jobs
    Start,

    /// Administrative commands against the local database
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AdminCommands {
    /// Show database statistics
    Stats,

    /// Trigger RocksDB compaction
    Compact,

    /// Run one accessibility probe batch now
    Probe,

    /// Remove articles over the failure threshold now
    Sweep,

    /// Probe a batch of author blogs now and drop unreachable authors
    ProbeAuthors,

    /// List the most referenced tags
    TopTags {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// List recent articles carrying any of the given tags
    ByTags {
        /// Comma-separated tag titles
        tags: String,

        /// Skip articles from this blog host
        #[arg(long)]
        exclude_host: Option<String>,

        #[arg(short, long, default_value = "10")]
        page_size: usize,
    },

    /// Print the effective configuration as TOML
    Config,
}

//! taghub daemon
//!
//! # Usage
//!
//! ```bash
//! taghub-daemon start [--db-path PATH]
//! taghub-daemon admin stats|compact|probe|sweep|config
//! taghub-daemon admin top-tags [-n N]
//! taghub-daemon admin by-tags rust,go [--exclude-host HOST] [-p N]
//! ```
//!
//! # Configuration
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. Config file (~/.config/taghub/config.toml)
//! 3. `--config` file
//! 4. Environment variables (TAGHUB_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use taghub_daemon::{handle_admin, start_daemon, Cli, Commands, Overrides};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = Overrides {
        config_path: cli.config.as_deref(),
        db_path: cli.db_path.as_deref(),
        log_level: cli.log_level.as_deref(),
    };

    match cli.command {
        Commands::Start => start_daemon(overrides).await?,
        Commands::Admin { command } => handle_admin(overrides, command).await?,
    }

    Ok(())
}

//! taghub daemon library exports.
//!
//! - `cli`: command-line parsing with clap
//! - `commands`: start and admin implementations

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli, Commands};
pub use commands::{handle_admin, init_tracing, load_settings, start_daemon, Hub, Overrides};

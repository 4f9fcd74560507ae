//! Command-line front end for Quire document histories.
//!
//! [`config`] holds the clap definitions, [`commands`] the operations they
//! map to.

pub mod commands;
pub mod config;

pub use commands::{App, ReplaySummary, format_history, read_source};
pub use config::{Cli, Command, DiffFormat, GlobalArgs};

//! Command-line front end of the able-seaman release manager.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Cli, Command};
pub use error::CliError;

//! CLI module
//!
//! Command-line interface and HTTP server mode.
//!
//! # Commands
//!
//! - `stargazers` - List the users who starred a repository
//! - `starred` - List the repositories a user starred
//! - `neighbours` - Find co-starred repositories
//! - `serve` - Start HTTP server mode
//! - `config` - Print the effective settings

mod commands;
mod runner;
mod server;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
pub use server::{router, serve, ServerConfig};

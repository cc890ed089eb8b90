//! CLI command definitions for xg2g-config.
//!
//! The binary loads configuration exactly as the service does, so operators
//! can check a file and environment before deploying them.

pub mod defaults;

use clap::{Parser, Subcommand};
use defaults::DefaultsArgs;
use std::path::PathBuf;

/// Inspect, validate and watch xg2g configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file (environment only if omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate the configuration, then print it with secrets masked
    Check {
        /// Print the resolved config as YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },

    /// Load the configuration and reload it whenever the file changes
    Watch,

    /// Print the default registry
    Defaults(DefaultsArgs),
}

//! CLI argument parsing for chunkstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cks")]
#[command(author, version, about = "Chunked key-value store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the store database (overrides config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a JSON value under a key
    Set {
        /// Key to store under
        #[arg(required = true)]
        key: String,

        /// JSON value, or "-" to read it from stdin
        #[arg(required = true)]
        value: String,
    },

    /// Print the value stored under a key
    Get {
        /// Key to read
        #[arg(required = true)]
        key: String,
    },

    /// Remove a key and all of its chunks
    Remove {
        /// Key to remove
        #[arg(required = true)]
        key: String,
    },

    /// List stored keys
    Keys,

    /// Show space usage
    Stats,

    /// Evict temporary and old entries
    Cleanup,
}

//! ChunkStore - chunked key-value store
//!
//! CLI entry point for inspecting and editing a SQLite-backed store.

use std::io::Read;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use chunkstore::cli::{Cli, Command};
use chunkstore::config::Config;
use chunkstore::{ChunkedStore, SqliteMedium};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("{e}"))?;

    Ok(())
}

fn read_value(raw: &str) -> Result<serde_json::Value> {
    let text = if raw == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("Failed to read value from stdin")?;
        buf
    } else {
        raw.to_string()
    };
    serde_json::from_str(&text).context("Value is not valid JSON")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    config.validate()?;

    info!(store = %config.store_path.display(), "chunkstore starting");

    let medium = SqliteMedium::open(&config.store_path)
        .context(format!("Failed to open store at {}", config.store_path.display()))?;
    let store = ChunkedStore::new(medium, config.store_options());

    match cli.command {
        Command::Set { key, value } => {
            let value = read_value(&value)?;
            store.set(&key, &value)?;
            println!("{} Stored {}", "✓".green(), key.cyan());
        }
        Command::Get { key } => match store.get::<serde_json::Value>(&key)? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => return Err(eyre::eyre!("Key not found: {}", key)),
        },
        Command::Remove { key } => {
            store.remove(&key)?;
            println!("{} Removed {}", "✓".green(), key);
        }
        Command::Keys => {
            let keys = store.keys()?;
            if keys.is_empty() {
                println!("No keys found");
            } else {
                for key in keys {
                    println!("{}", key);
                }
            }
        }
        Command::Stats => {
            let usage = store.usage()?;
            println!("Store: {}", config.store_path.display().to_string().cyan());
            println!("  Used bytes: {}", usage.used_bytes);
            println!("  Limit bytes: {}", usage.limit_bytes);
            println!("  Physical keys: {}", usage.physical_keys);
        }
        Command::Cleanup => {
            let removed = store.cleanup()?;
            println!("{} Evicted {} keys", "✓".green(), removed);
        }
    }

    store.close()?;
    Ok(())
}

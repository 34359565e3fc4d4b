//! `nvsctl` — inspect and edit an NVS partition image.
//!
//! Usage:
//!   nvsctl [--config <path>] [--namespace <name>] <command> ...
//!
//! Without `--config`, `./nvs.toml` is used if present, otherwise defaults.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;

use nvs_kv::{KeyValueStore, StoreConfig, StoreError};

/// NVS key-value store tool.
#[derive(Parser, Debug)]
#[command(name = "nvsctl", about = "NVS key-value store tool")]
struct Cli {
    /// Path to the store config file.
    #[arg(long = "config", short = 'c', global = true, default_value = "nvs.toml")]
    config: PathBuf,

    /// Namespace (overrides the config file).
    #[arg(long = "namespace", short = 'n', global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value of a key.
    Get { key: String },

    /// Set a key, overwriting any existing value.
    Set { key: String, value: String },

    /// Add a key that must not exist yet.
    Insert { key: String, value: String },

    /// Replace the value of an existing key.
    Update { key: String, value: String },

    /// Remove a key.
    Remove { key: String },

    /// Exit successfully if the key exists.
    Exists { key: String },

    /// Print the buffer size needed to read a key, terminator included.
    Len { key: String },

    /// Remove every key in the namespace.
    EraseAll,

    /// Wipe the whole partition, every namespace included.
    EraseFlash {
        /// Required confirmation.
        #[arg(long)]
        yes: bool,
    },
}

fn run(store: &KeyValueStore, command: Commands) -> Result<(), StoreError> {
    match command {
        Commands::Get { key } => {
            println!("{}", store.get_string(&key)?);
        }
        Commands::Set { key, value } => store.set(&key, &value)?,
        Commands::Insert { key, value } => store.insert(&key, &value)?,
        Commands::Update { key, value } => store.update(&key, &value)?,
        Commands::Remove { key } => store.remove(&key)?,
        Commands::Exists { key } => store.is_exist(&key)?,
        Commands::Len { key } => {
            println!("{}", store.get_value_length(&key)?);
        }
        Commands::EraseAll => store.erase_all()?,
        Commands::EraseFlash { yes } => {
            if !yes {
                eprintln!("refusing to erase the partition without --yes");
                return Err(StoreError::Error);
            }
            store.erase_flash_all()?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::load(&cli.config)?;
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }
    info!(
        "Opening {} (namespace {:?})",
        config.flash.path.display(),
        config.namespace
    );
    let store = config.open_store()?;

    match run(&store, cli.command) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            let mut buf = [0u8; 64];
            KeyValueStore::error_to_string(Some(err), &mut buf);
            let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
            eprintln!("{}", String::from_utf8_lossy(&buf[..end]));
            Ok(ExitCode::from(err.code()))
        }
    }
}

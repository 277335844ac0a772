use crate::storage::StorageType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn parse_storage_type(value: &str) -> Result<StorageType, String> {
    StorageType::from_str(value).ok_or_else(|| format!("unknown storage type '{}' (json, sqlite)", value))
}

#[derive(Debug, Parser)]
#[command(name = "trtodo", version, about = "Todo list API server and terminal client")]
pub struct Cli {
    /// Config file to use instead of ~/.config/trtodo/config.json
    #[arg(long, global = true, env = "TRTODO_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL for client commands, e.g. http://localhost:1234/api/v1
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Store file, overriding storage.path
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long, value_parser = parse_storage_type)]
        storage_type: Option<StorageType>,
    },
    /// Create an empty store at the configured location
    Init {
        /// Replace an existing store
        #[arg(long)]
        force: bool,
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long, value_parser = parse_storage_type)]
        storage_type: Option<StorageType>,
    },
    /// Copy the configured store into a new store of another type
    Migrate {
        #[arg(long, value_parser = parse_storage_type)]
        to: StorageType,
        #[arg(long)]
        path: PathBuf,
    },
    /// Show open todos
    List,
    /// Add a todo
    Add {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Change a todo's name or description
    Edit {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Mark a todo as completed
    Complete { id: u64 },
    /// Delete a todo
    Delete {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

use crate::models::StoreData;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod json;
pub mod migrations;
pub mod sqlite;
#[cfg(test)]
pub(crate) mod test_utils;

pub use json::JsonStorage;
pub use sqlite::SqliteStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Store not found at {0}")]
    Missing(PathBuf),
    #[error("Store already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Json,
    Sqlite,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(StorageType::Json),
            "sqlite" => Some(StorageType::Sqlite),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Json => "json",
            StorageType::Sqlite => "sqlite",
        }
    }
}

/// A whole-store backend: every load reads all records, every save replaces them.
pub trait Storage: Send + Sync {
    fn load(&self) -> Result<StoreData, StorageError>;
    fn save(&self, data: &StoreData) -> Result<(), StorageError>;
    /// Creates an empty store. Fails with `AlreadyExists` unless `force` is set.
    fn init(&self, force: bool) -> Result<(), StorageError>;
    fn location(&self) -> &Path;
}

pub fn create_storage(storage_type: StorageType, path: &Path) -> Box<dyn Storage> {
    match storage_type {
        StorageType::Json => Box::new(JsonStorage::new(path)),
        StorageType::Sqlite => Box::new(SqliteStorage::new(path)),
    }
}

/// Copies every record and the id sequence from `source` into a freshly initialised `target`.
pub fn migrate_store(source: &dyn Storage, target: &dyn Storage) -> Result<usize, StorageError> {
    let data = source.load()?;
    target.init(false)?;
    target.save(&data)?;
    tracing::info!(
        from = %source.location().display(),
        to = %target.location().display(),
        count = data.todos.len(),
        "migrated store"
    );
    Ok(data.todos.len())
}

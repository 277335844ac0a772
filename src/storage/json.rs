use super::{Storage, StorageError};
use crate::models::{StoreData, StoreFile};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = shellexpand::tilde(&path.as_ref().to_string_lossy()).to_string();
        Self {
            path: PathBuf::from(path),
        }
    }

    fn write_atomic(&self, data: &StoreData) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let json = serde_json::to_string_pretty(data)?;

        // Written beside the store and renamed into place, so readers never see a partial file.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

impl Storage for JsonStorage {
    fn load(&self) -> Result<StoreData, StorageError> {
        if !self.path.exists() {
            return Err(StorageError::Missing(self.path.clone()));
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let file: StoreFile = serde_json::from_str(&contents)?;
        Ok(file.into())
    }

    fn save(&self, data: &StoreData) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Err(StorageError::Missing(self.path.clone()));
        }
        self.write_atomic(data)
    }

    fn init(&self, force: bool) -> Result<(), StorageError> {
        if self.path.exists() && !force {
            return Err(StorageError::AlreadyExists(self.path.clone()));
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.write_atomic(&StoreData::new())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

use crate::models::{StoreData, Todo};
use crate::storage::{create_storage, Storage, StorageType};
use std::path::PathBuf;
use tempfile::TempDir;

/// An initialised store inside its own temporary directory.
pub struct TestStore {
    temp_dir: TempDir,
    storage: Box<dyn Storage>,
}

impl TestStore {
    pub fn new(storage_type: StorageType) -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("trtodo_test")
            .tempdir()
            .expect("Failed to create temporary directory");

        let file_name = match storage_type {
            StorageType::Json => "todos.json",
            StorageType::Sqlite => "todos.db",
        };
        let storage = create_storage(storage_type, &temp_dir.path().join(file_name));
        storage
            .init(false)
            .expect("Failed to initialize test storage");

        Self { temp_dir, storage }
    }

    pub fn storage(&self) -> &dyn Storage {
        &*self.storage
    }

    pub fn into_parts(self) -> (Box<dyn Storage>, TempDir) {
        (self.storage, self.temp_dir)
    }

    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }
}

pub fn todo(id: u64, name: &str) -> Todo {
    Todo {
        id,
        name: name.to_string(),
        description: Some(format!("{} description", name)),
        is_completed: false,
        created_at: None,
        updated_at: None,
    }
}

/// Three todos, ids 1..=3, sequence at 4.
pub fn sample_store() -> StoreData {
    StoreData {
        next_id: 4,
        todos: vec![todo(1, "Write report"), todo(2, "Call bank"), todo(3, "Water plants")],
        ..StoreData::new()
    }
}

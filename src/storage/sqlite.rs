use super::migrations::{self, INIT_SCHEMA};
use super::{Storage, StorageError};
use crate::models::{StoreData, Todo, STORE_VERSION};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub struct SqliteStorage {
    path: PathBuf,
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = shellexpand::tilde(&path.as_ref().to_string_lossy()).to_string();
        Self {
            path: PathBuf::from(path),
        }
    }

    /// Opens the existing database and brings its schema up to date.
    fn connect(&self) -> Result<Connection, StorageError> {
        if !self.path.exists() {
            return Err(StorageError::Missing(self.path.clone()));
        }
        let mut conn = Connection::open(&self.path)
            .map_err(|e| StorageError::Storage(format!("Failed to open database: {}", e)))?;
        migrations::apply_migrations(&mut conn)?;
        Ok(conn)
    }

    fn parse_timestamp(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        idx,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()
    }

    fn load_todos(conn: &Connection) -> Result<Vec<Todo>, StorageError> {
        let mut stmt = conn
            .prepare(
                "SELECT id, name, description, is_completed, created_at, updated_at
                 FROM todos ORDER BY position",
            )
            .map_err(|e| StorageError::Storage(format!("Failed to prepare todos query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Todo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    is_completed: row.get(3)?,
                    created_at: Self::parse_timestamp(4, row.get(4)?)?,
                    updated_at: Self::parse_timestamp(5, row.get(5)?)?,
                })
            })
            .map_err(|e| StorageError::Storage(format!("Failed to query todos: {}", e)))?;

        let mut todos = Vec::new();
        for todo in rows {
            todos.push(
                todo.map_err(|e| StorageError::Storage(format!("Failed to read todo: {}", e)))?,
            );
        }
        Ok(todos)
    }

    fn load_next_id(conn: &Connection) -> Result<u64, StorageError> {
        conn.query_row("SELECT next_id FROM id_sequence", [], |row| row.get(0))
            .map_err(|e| StorageError::Storage(format!("Failed to read id sequence: {}", e)))
    }
}

impl Storage for SqliteStorage {
    fn load(&self) -> Result<StoreData, StorageError> {
        let conn = self.connect()?;
        let mut data = StoreData {
            version: STORE_VERSION,
            next_id: Self::load_next_id(&conn)?,
            todos: Self::load_todos(&conn)?,
        };
        data.repair_sequence();
        Ok(data)
    }

    fn save(&self, data: &StoreData) -> Result<(), StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM todos", [])?;
        for (position, todo) in data.todos.iter().enumerate() {
            tx.execute(
                "INSERT INTO todos (id, position, name, description, is_completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    todo.id,
                    position as i64,
                    todo.name,
                    todo.description,
                    todo.is_completed,
                    todo.created_at.map(|dt| dt.to_rfc3339()),
                    todo.updated_at.map(|dt| dt.to_rfc3339()),
                ],
            )?;
        }
        tx.execute("UPDATE id_sequence SET next_id = ?1", params![data.next_id])?;

        tx.commit()?;
        Ok(())
    }

    fn init(&self, force: bool) -> Result<(), StorageError> {
        if self.path.exists() {
            if !force {
                return Err(StorageError::AlreadyExists(self.path.clone()));
            }
            std::fs::remove_file(&self.path)?;
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&self.path)
            .map_err(|e| StorageError::Storage(format!("Failed to create database: {}", e)))?;
        conn.execute_batch(INIT_SCHEMA)?;
        drop(conn);

        // Bring the fresh schema forward through the same path old stores take.
        self.connect().map(|_| ())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::sample_store;

    #[test]
    fn test_missing_database_is_not_created() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("todos.db");
        let storage = SqliteStorage::new(&path);

        assert!(matches!(storage.load(), Err(StorageError::Missing(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_uninitialised_file_is_unreadable() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let storage = SqliteStorage::new(temp_file.path());
        assert!(storage.load().is_err());
    }

    #[test]
    fn test_save_and_load_preserves_order_and_sequence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(temp_dir.path().join("todos.db"));
        storage.init(false).unwrap();

        let mut data = sample_store();
        data.todos.reverse();
        storage.save(&data).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded, data);
        assert_eq!(loaded.todos[0].id, 3);
    }

    #[test]
    fn test_init_force_wipes_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(temp_dir.path().join("todos.db"));
        storage.init(false).unwrap();
        storage.save(&sample_store()).unwrap();

        assert!(matches!(
            storage.init(false),
            Err(StorageError::AlreadyExists(_))
        ));
        storage.init(true).unwrap();
        let loaded = storage.load().unwrap();
        assert!(loaded.todos.is_empty());
        assert_eq!(loaded.next_id, 1);
    }
}

//! Schema migrations for the SQLite store
//!
//! A fresh database is created at version 1 by [`INIT_SCHEMA`] and then brought
//! forward by [`apply_migrations`]. Every connection opened by the SQLite backend
//! runs pending migrations first, so a store created by an older build is
//! upgraded in place the first time it is touched.
//!
//! # Adding a migration
//!
//! Append an entry to [`MIGRATIONS`] with the next version number. `down` must
//! exactly reverse `up`; both run inside the caller's transaction together with
//! the `schema_version` bump.

use super::StorageError;
use rusqlite::{Connection, Transaction};

/// Version 1: the ordered todo table and the version marker.
pub const INIT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
INSERT INTO schema_version (version) VALUES (1);

CREATE TABLE IF NOT EXISTS todos (
    id INTEGER PRIMARY KEY,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    is_completed BOOLEAN NOT NULL DEFAULT 0
);
"#;

/// Represents a database migration with up and down SQL statements
#[derive(Debug)]
pub struct Migration {
    pub version: i32,
    pub up: &'static str,
    pub down: &'static str,
}

/// List of all database migrations in order of application
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 2,
        up: r#"
            ALTER TABLE todos ADD COLUMN created_at TEXT;
            ALTER TABLE todos ADD COLUMN updated_at TEXT;
        "#,
        down: r#"
            ALTER TABLE todos DROP COLUMN updated_at;
            ALTER TABLE todos DROP COLUMN created_at;
        "#,
    },
    Migration {
        version: 3,
        up: r#"
            CREATE TABLE id_sequence (next_id INTEGER NOT NULL);
            INSERT INTO id_sequence (next_id) SELECT COALESCE(MAX(id), 0) + 1 FROM todos;
        "#,
        down: "DROP TABLE id_sequence;",
    },
];

pub fn latest_version() -> i32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(1)
}

/// Get the current schema version from the database
pub fn get_current_version(conn: &Connection) -> Result<i32, StorageError> {
    conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .map_err(|e| StorageError::Storage(format!("Failed to get schema version: {}", e)))
}

/// Applies every migration newer than the stored version, in one transaction.
pub fn apply_migrations(conn: &mut Connection) -> Result<(), StorageError> {
    let current_version = get_current_version(conn)?;
    if current_version >= latest_version() {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .map_err(|e| StorageError::Storage(format!("Failed to start transaction: {}", e)))?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        apply_migration(&tx, migration)?;
    }
    tx.commit()
        .map_err(|e| StorageError::Storage(format!("Failed to commit transaction: {}", e)))?;

    tracing::debug!(
        from = current_version,
        to = latest_version(),
        "applied sqlite migrations"
    );
    Ok(())
}

fn apply_migration(tx: &Transaction, migration: &Migration) -> Result<(), StorageError> {
    tx.execute_batch(migration.up).map_err(|e| {
        StorageError::Storage(format!(
            "Failed to apply migration {}: {}",
            migration.version, e
        ))
    })?;

    tx.execute("UPDATE schema_version SET version = ?1", [migration.version])
        .map_err(|e| {
            StorageError::Storage(format!(
                "Failed to update schema version to {}: {}",
                migration.version, e
            ))
        })?;

    Ok(())
}

/// Reverts migrations newer than `target_version`, newest first.
pub fn rollback_migrations(conn: &mut Connection, target_version: i32) -> Result<(), StorageError> {
    let current_version = get_current_version(conn)?;
    if current_version <= target_version {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .map_err(|e| StorageError::Storage(format!("Failed to start transaction: {}", e)))?;
    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > target_version && m.version <= current_version)
        .rev()
    {
        rollback_migration(&tx, migration)?;
    }
    tx.commit()
        .map_err(|e| StorageError::Storage(format!("Failed to commit transaction: {}", e)))?;

    Ok(())
}

fn rollback_migration(tx: &Transaction, migration: &Migration) -> Result<(), StorageError> {
    tx.execute_batch(migration.down).map_err(|e| {
        StorageError::Storage(format!(
            "Failed to rollback migration {}: {}",
            migration.version, e
        ))
    })?;

    tx.execute(
        "UPDATE schema_version SET version = ?1",
        [migration.version - 1],
    )
    .map_err(|e| {
        StorageError::Storage(format!(
            "Failed to update schema version to {}: {}",
            migration.version - 1,
            e
        ))
    })?;

    Ok(())
}

//! String-keyed persistence, shaped after browser local storage.
//!
//! Stores take an `Arc<dyn Storage>` so tests can run against memory and the
//! app against an on-disk SQLite file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::error::StorageError;

pub const HISTORY_KEY: &str = "philo_trans_history";
pub const SETTINGS_KEY: &str = "philo_trans_settings";

pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Read-modify-write a single key without another writer slipping in
    /// between. Returning `None` from `f` removes the key.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        match f(items.get(key).cloned()) {
            Some(value) => items.insert(key.to_string(), value),
            None => items.remove(key),
        };
        Ok(())
    }
}

/// Single-table key-value store in a SQLite file.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening storage database");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
}

fn write_value(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

impl Storage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(read_value(&conn, key)?)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(write_value(&conn, key, value)?)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        // IMMEDIATE takes the write lock up front so another process sharing
        // the file cannot write between our read and our write.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = read_value(&tx, key)?;
        match f(current) {
            Some(value) => write_value(&tx, key, &value)?,
            None => {
                tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

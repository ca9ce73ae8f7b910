//! Durable local state for application metadata.
//!
//! State is kept as independent keyed JSON records (the connection set, the
//! theme preference and the query history) behind the [`StateStore`] port.
//! [`LocalStorage`] persists them in SQLite; [`MemoryStore`] keeps them in
//! memory for tests.
//!
//! # Data Directory Locations
//!
//! - **macOS**: `~/Library/Application Support/dev.veddb.VedDB`
//! - **Windows**: `%APPDATA%\veddb\VedDB`
//! - **Linux**: `~/.local/share/veddb`
//! - **Debug builds**: `./veddb_data` in current directory

use crate::error::VeddbError;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Record key for the saved connection set.
pub const CONNECTIONS_KEY: &str = "connections";

/// Record key for the theme preference.
pub const THEME_KEY: &str = "theme";

/// Record key for the query history.
pub const HISTORY_KEY: &str = "query_history";

/// Get the default data directory for the application.
///
/// Debug builds use `./veddb_data` in the current directory.
pub fn default_data_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from("./veddb_data")
    }

    #[cfg(not(debug_assertions))]
    {
        dirs::data_dir()
            .map(|d| {
                #[cfg(target_os = "macos")]
                {
                    d.join("dev.veddb.VedDB")
                }
                #[cfg(target_os = "windows")]
                {
                    d.join("veddb").join("VedDB")
                }
                #[cfg(not(any(target_os = "macos", target_os = "windows")))]
                {
                    d.join("veddb")
                }
            })
            .unwrap_or_else(|| PathBuf::from("./veddb_data"))
    }
}

/// Initialize the data directory, creating it if needed.
pub fn init_data_dir(path: &Path) -> Result<(), VeddbError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(VeddbError::storage(
                format!("Data path exists but is not a directory: {}", path.display()),
                Some("Select a different location or remove the existing file"),
            ));
        }
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| {
        VeddbError::storage(
            format!("Failed to create data directory '{}': {}", path.display(), e),
            Some("Check permissions or select a different location"),
        )
    })?;

    tracing::info!(path = %path.display(), "Created data directory");
    Ok(())
}

/// Persistence port for keyed JSON records.
pub trait StateStore: Send + Sync {
    /// Load a record. `Ok(None)` when the key was never saved.
    fn load(&self, key: &str) -> Result<Option<Value>, VeddbError>;

    /// Replace a record.
    fn save(&self, key: &str, value: &Value) -> Result<(), VeddbError>;

    /// Remove a record.
    fn delete(&self, key: &str) -> Result<(), VeddbError>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Load a typed record, falling back to its default when missing or corrupt.
///
/// Startup must never fail because of bad persisted state, so storage and
/// decoding errors are logged and swallowed here.
pub fn load_or_default<T>(store: &dyn StateStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.load(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(key, error = %e, "Persisted state is corrupt, using defaults");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to load persisted state, using defaults");
            T::default()
        }
    }
}

/// Serialize and save a typed record.
pub fn save_record<T: Serialize>(
    store: &dyn StateStore,
    key: &str,
    state: &T,
) -> Result<(), VeddbError> {
    let value = serde_json::to_value(state)?;
    store.save(key, &value)?;
    tracing::trace!(key, store = store.name(), "State persisted");
    Ok(())
}

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw record, bypassing typed serialization.
    pub fn insert_raw(&self, key: &str, value: Value) {
        self.records.lock().insert(key.to_string(), value);
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, VeddbError> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), VeddbError> {
        self.records.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), VeddbError> {
        self.records.lock().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MemoryStore"
    }
}

/// In-memory store whose writes can be switched to fail.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    fail_writes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FailingStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), VeddbError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(VeddbError::storage("disk full", None));
        }
        Ok(())
    }
}

#[cfg(test)]
impl StateStore for FailingStore {
    fn load(&self, key: &str) -> Result<Option<Value>, VeddbError> {
        self.inner.load(key)
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), VeddbError> {
        self.check()?;
        self.inner.save(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), VeddbError> {
        self.check()?;
        self.inner.delete(key)
    }

    fn name(&self) -> &'static str {
        "FailingStore"
    }
}

/// SQLite-based local storage for application data.
///
/// Thread-safe via internal Mutex. Uses WAL mode for concurrent reads.
pub struct LocalStorage {
    /// Thread-safe SQLite connection
    connection: Mutex<Connection>,
    /// Data directory path
    data_dir: PathBuf,
}

impl LocalStorage {
    /// Open or create local storage in the given data directory.
    pub fn open(data_dir: PathBuf) -> Result<Self, VeddbError> {
        init_data_dir(&data_dir)?;
        let db_path = data_dir.join("veddb.db");
        Self::open_with_path(db_path, data_dir)
    }

    /// Open storage with a specific database path (for testing).
    pub fn open_with_path(db_path: PathBuf, data_dir: PathBuf) -> Result<Self, VeddbError> {
        let connection = Connection::open(&db_path).map_err(|e| {
            VeddbError::storage(
                format!("Failed to open database '{}': {}", db_path.display(), e),
                Some("The database file may be corrupted. Try deleting it to start fresh."),
            )
        })?;

        Self::configure_connection(&connection)?;

        let storage = Self { connection: Mutex::new(connection), data_dir };
        storage.run_migrations()?;

        tracing::info!(path = %db_path.display(), "Local storage opened");
        Ok(storage)
    }

    /// Configure SQLite connection with optimal pragmas.
    fn configure_connection(conn: &Connection) -> Result<(), VeddbError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
            ",
        )
        .map_err(|e| VeddbError::storage(format!("Failed to configure database: {e}"), None))
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<(), VeddbError> {
        let conn = self.connection.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS migrations (
                domain TEXT NOT NULL,
                step INTEGER NOT NULL,
                migration TEXT NOT NULL,
                PRIMARY KEY(domain, step)
            ) STRICT",
            [],
        )
        .map_err(|e| VeddbError::storage(format!("Failed to create migrations table: {e}"), None))?;

        const DOMAIN: &str = "core";

        let current_step: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(step), 0) FROM migrations WHERE domain = ?",
                [DOMAIN],
                |row| row.get(0),
            )
            .map_err(|e| {
                VeddbError::storage(format!("Failed to read migration state: {e}"), None)
            })?;

        // Migration 1: keyed state records
        if current_step < 1 {
            conn.execute_batch(
                "
                CREATE TABLE app_state (
                    key TEXT PRIMARY KEY,
                    value_json TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                ) STRICT;
                ",
            )
            .map_err(|e| VeddbError::storage(format!("Migration 1 failed: {e}"), None))?;

            conn.execute(
                "INSERT INTO migrations (domain, step, migration) VALUES (?, 1, 'app_state')",
                [DOMAIN],
            )
            .map_err(|e| VeddbError::storage(format!("Failed to record migration: {e}"), None))?;

            tracing::info!("Applied migration 1: app_state");
        }

        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }
}

impl StateStore for LocalStorage {
    fn load(&self, key: &str) -> Result<Option<Value>, VeddbError> {
        let conn = self.connection.lock();

        let result: Option<String> = conn
            .query_row("SELECT value_json FROM app_state WHERE key = ?", [key], |row| row.get(0))
            .optional()
            .map_err(|e| VeddbError::storage(format!("Failed to load state '{key}': {e}"), None))?;

        match result {
            Some(json_str) => {
                let value = serde_json::from_str(&json_str).map_err(|e| {
                    VeddbError::storage(format!("Invalid state JSON for '{key}': {e}"), None)
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), VeddbError> {
        let conn = self.connection.lock();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO app_state (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
            params![key, value.to_string(), now],
        )
        .map_err(|e| VeddbError::storage(format!("Failed to save state '{key}': {e}"), None))?;

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), VeddbError> {
        let conn = self.connection.lock();

        conn.execute("DELETE FROM app_state WHERE key = ?", [key])
            .map_err(|e| VeddbError::storage(format!("Failed to delete state '{key}': {e}"), None))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "LocalStorage"
    }
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage").field("data_dir", &self.data_dir).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_local_storage_round_trip() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();

        assert_eq!(storage.load(THEME_KEY).unwrap(), None);
        storage.save(THEME_KEY, &json!("dark")).unwrap();
        assert_eq!(storage.load(THEME_KEY).unwrap(), Some(json!("dark")));

        storage.save(THEME_KEY, &json!("light")).unwrap();
        assert_eq!(storage.load(THEME_KEY).unwrap(), Some(json!("light")));

        storage.delete(THEME_KEY).unwrap();
        assert_eq!(storage.load(THEME_KEY).unwrap(), None);
    }

    #[test]
    fn test_local_storage_survives_reopen() {
        let dir = tempdir().unwrap();

        {
            let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();
            storage.save(CONNECTIONS_KEY, &json!({"profiles": []})).unwrap();
        }

        {
            let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();
            assert_eq!(storage.load(CONNECTIONS_KEY).unwrap(), Some(json!({"profiles": []})));
        }
    }

    #[test]
    fn test_unreadable_migration_state_fails_open() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("veddb.db");
        Connection::open(&db_path)
            .unwrap()
            .execute_batch("CREATE TABLE migrations (id INTEGER PRIMARY KEY);")
            .unwrap();

        let err = LocalStorage::open_with_path(db_path, dir.path().to_path_buf()).unwrap_err();
        assert_eq!(err.category(), "Storage");
        assert!(err.to_string().contains("migration state"));
    }

    #[test]
    fn test_load_or_default_on_corrupt_record() {
        let store = MemoryStore::new();
        store.insert_raw(HISTORY_KEY, json!("not a list"));

        let records: Vec<u32> = load_or_default(&store, HISTORY_KEY);
        assert!(records.is_empty());

        let missing: Vec<u32> = load_or_default(&store, "missing");
        assert!(missing.is_empty());
    }

    #[test]
    fn test_init_data_dir_rejects_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        assert!(init_data_dir(&file).is_err());
        assert!(init_data_dir(&dir.path().join("nested/data")).is_ok());
    }
}

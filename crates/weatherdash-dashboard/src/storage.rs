//! Key-value persistence for dashboard preferences.
//!
//! Values are JSON strings under three keys: `unit`, `favorites` and
//! `recentSearches`. Writes always replace the whole value.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use weatherdash_core::{RusqliteErrorExt, StorageError};
use weatherdash_weather::{FavoriteEntry, FavoriteKey, Unit};

pub const UNIT_KEY: &str = "unit";
pub const FAVORITES_KEY: &str = "favorites";
pub const RECENT_SEARCHES_KEY: &str = "recentSearches";

/// String storage that survives restarts.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// SQLite-backed store: one `kv` table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_storage_error)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_storage_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(RusqliteErrorExt::into_storage_error)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(RusqliteErrorExt::into_storage_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map(|_| ())
            .map_err(RusqliteErrorExt::into_storage_error)
    }
}

/// Process-local store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to the persisted dashboard preferences.
///
/// Unreadable values are logged and treated as absent; only failures of the
/// store itself are returned as errors.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load_unit(&self) -> Result<Option<Unit>, StorageError> {
        let Some(raw) = self.store.get(UNIT_KEY)? else {
            return Ok(None);
        };

        // Older sessions stored the bare word rather than a JSON string
        let unit = serde_json::from_str::<Unit>(&raw)
            .ok()
            .or_else(|| raw.parse::<Unit>().ok());
        if unit.is_none() {
            tracing::warn!("Ignoring unreadable stored unit: {:?}", raw);
        }
        Ok(unit)
    }

    pub fn save_unit(&self, unit: Unit) -> Result<(), StorageError> {
        self.save_json(UNIT_KEY, &unit)
    }

    /// Stored favorites, keeping the first entry for any repeated city key.
    pub fn load_favorites(&self) -> Result<Vec<FavoriteEntry>, StorageError> {
        let favorites: Vec<FavoriteEntry> = self.load_json(FAVORITES_KEY)?.unwrap_or_default();
        let mut seen: Vec<FavoriteKey> = Vec::with_capacity(favorites.len());
        Ok(favorites
            .into_iter()
            .filter(|fav| {
                let key = fav.key();
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            })
            .collect())
    }

    pub fn save_favorites(&self, favorites: &[FavoriteEntry]) -> Result<(), StorageError> {
        self.save_json(FAVORITES_KEY, &favorites)
    }

    pub fn load_recent_searches(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.load_json(RECENT_SEARCHES_KEY)?.unwrap_or_default())
    }

    pub fn save_recent_searches(&self, searches: &[String]) -> Result<(), StorageError> {
        self.save_json(RECENT_SEARCHES_KEY, &searches)
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable stored value for '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fav(city: &str, temp: i32) -> FavoriteEntry {
        FavoriteEntry {
            city_name: city.to_string(),
            temperature: temp,
            condition: "clear sky".to_string(),
        }
    }

    #[test]
    fn test_sqlite_store_set_replaces_value() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get("unit").unwrap(), None);

        store.set("unit", "\"imperial\"").unwrap();
        store.set("unit", "\"metric\"").unwrap();
        assert_eq!(store.get("unit").unwrap().as_deref(), Some("\"metric\""));
        assert_eq!(store.get("favorites").unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("favorites", "[]").unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get("favorites").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_unit_round_trips_as_json_string() {
        let store = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(store.clone());

        prefs.save_unit(Unit::Imperial).unwrap();
        assert_eq!(store.get(UNIT_KEY).unwrap().as_deref(), Some("\"imperial\""));
        assert_eq!(prefs.load_unit().unwrap(), Some(Unit::Imperial));
    }

    #[test]
    fn test_bare_unit_word_is_accepted() {
        let store = Arc::new(MemoryStore::new());
        store.set(UNIT_KEY, "imperial").unwrap();
        let prefs = Preferences::new(store);
        assert_eq!(prefs.load_unit().unwrap(), Some(Unit::Imperial));
    }

    #[test]
    fn test_garbage_unit_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set(UNIT_KEY, "{kelvin").unwrap();
        let prefs = Preferences::new(store);
        assert_eq!(prefs.load_unit().unwrap(), None);
    }

    #[test]
    fn test_favorites_persist_in_wire_shape() {
        let store = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(store.clone());

        prefs.save_favorites(&[fav("Paris", 18)]).unwrap();
        assert_eq!(
            store.get(FAVORITES_KEY).unwrap().as_deref(),
            Some(r#"[{"city":"Paris","temp":18,"condition":"clear sky"}]"#)
        );
    }

    #[test]
    fn test_loaded_favorites_are_deduplicated_by_key() {
        let store = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(store);
        prefs
            .save_favorites(&[fav("Paris", 18), fav("paris ", 20), fav("Oslo", -2)])
            .unwrap();

        let loaded = prefs.load_favorites().unwrap();
        assert_eq!(loaded, vec![fav("Paris", 18), fav("Oslo", -2)]);
    }

    #[test]
    fn test_corrupt_favorites_load_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(FAVORITES_KEY, "not json").unwrap();
        let prefs = Preferences::new(store);
        assert!(prefs.load_favorites().unwrap().is_empty());
    }

    #[test]
    fn test_recent_searches_round_trip() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        assert!(prefs.load_recent_searches().unwrap().is_empty());

        let searches = vec!["Paris".to_string(), "Oslo".to_string()];
        prefs.save_recent_searches(&searches).unwrap();
        assert_eq!(prefs.load_recent_searches().unwrap(), searches);
    }
}

//! SQLite-backed persistent key-value store.
//!
//! Every persisted datum (user settings, dataset payloads, per-dataset
//! refresh timestamps) lives in one `kv` table as a JSON-encoded value
//! under an independent key. Writes are last-writer-wins per key; there
//! are no multi-key transactions because each entry is independent and
//! eventually consistent.

mod migrations;

use std::path::Path;

use crate::Error;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Key-value store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct KeyValueStore {
    conn: Connection,
}

impl KeyValueStore {
    /// Open a store at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path.as_ref().to_path_buf())
            .await
            .map_err(|e| Error::Storage(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory store for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Storage(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Storage)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }

    /// Get the raw JSON text stored under `key`, or None if absent.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                });

                match result {
                    Ok(v) => Ok(Some(v)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store raw JSON text under `key`, replacing any previous value.
    pub async fn set_raw(&self, key: &str, value: String) -> Result<(), Error> {
        let key = key.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         updated_at = excluded.updated_at",
                    params![key, value, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a typed value by key.
    ///
    /// Returns None if the key doesn't exist in the store.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Get a typed value by key, falling back to `default` if absent.
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, Error> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Store a typed value under `key`.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        self.set_raw(key, serde_json::to_string(value)?).await
    }

    /// Delete a key. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List all stored keys in lexical order.
    pub async fn list_keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
                let keys = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every key (factory reset). Returns the number of deleted entries.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM kv", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        store.set("answer", &42u32).await.unwrap();

        let value: Option<u32> = store.get("answer").await.unwrap();
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        let value: Option<String> = store.get("nonexistent").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_get_or_default() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        let value: u64 = store.get_or("missing", 7).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_overwrite_is_last_writer_wins() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        store.set("k", &"first").await.unwrap();
        store.set("k", &"second").await.unwrap();

        let value: Option<String> = store.get("k").await.unwrap();
        assert_eq!(value.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        store.set("b", &1).await.unwrap();
        store.set("a", &2).await.unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);

        store.delete("a").await.unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["b"]);

        store.delete("a").await.unwrap(); // absent key is fine
    }

    #[tokio::test]
    async fn test_clear_wipes_everything() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        store.set("a", &1).await.unwrap();
        store.set("b", &2).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_supported_types() {
        let store = KeyValueStore::open_in_memory().await.unwrap();

        store.set("bool", &true).await.unwrap();
        store.set("number", &1.5f64).await.unwrap();
        store.set("string", &"hello").await.unwrap();
        store.set("array", &vec!["href".to_string(), "src".to_string()]).await.unwrap();

        assert_eq!(store.get::<bool>("bool").await.unwrap(), Some(true));
        assert_eq!(store.get::<f64>("number").await.unwrap(), Some(1.5));
        assert_eq!(store.get::<String>("string").await.unwrap(), Some("hello".into()));
        assert_eq!(
            store.get::<Vec<String>>("array").await.unwrap(),
            Some(vec!["href".to_string(), "src".to_string()])
        );
    }
}

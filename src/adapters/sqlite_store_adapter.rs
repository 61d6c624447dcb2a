//! SQLite document store adapter.
//!
//! Key → JSON documents in a single `documents` table; an upsert per `put`
//! gives the same last-write-wins semantics as the JSON file store.

use crate::domain::error::ReplayError;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::DocumentStorePort;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

#[derive(Debug)]
pub struct SqliteStoreAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStoreAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ReplayError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| ReplayError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| ReplayError::Store {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, ReplayError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| ReplayError::Store {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn initialize_schema(&self) -> Result<(), ReplayError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e: rusqlite::Error| ReplayError::Store {
            reason: e.to_string(),
        })
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, ReplayError> {
        self.pool.get().map_err(|e: r2d2::Error| ReplayError::Store {
            reason: e.to_string(),
        })
    }
}

impl DocumentStorePort for SqliteStoreAdapter {
    fn put(&self, key: &str, document: &serde_json::Value) -> Result<(), ReplayError> {
        let content = serde_json::to_string(document).map_err(|e| ReplayError::Store {
            reason: format!("failed to serialize document '{key}': {e}"),
        })?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, content],
        )
        .map_err(|e| ReplayError::Store {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ReplayError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT value FROM documents WHERE key = ?1")
            .map_err(|e| ReplayError::Store {
                reason: e.to_string(),
            })?;
        let mut rows = stmt
            .query(params![key])
            .map_err(|e| ReplayError::Store {
                reason: e.to_string(),
            })?;

        match rows.next().map_err(|e| ReplayError::Store {
            reason: e.to_string(),
        })? {
            None => Ok(None),
            Some(row) => {
                let content: String = row.get(0).map_err(|e| ReplayError::Store {
                    reason: e.to_string(),
                })?;
                serde_json::from_str(&content)
                    .map(Some)
                    .map_err(|e| ReplayError::Store {
                        reason: format!("malformed document '{key}': {e}"),
                    })
            }
        }
    }

    fn delete(&self, key: &str) -> Result<bool, ReplayError> {
        let conn = self.conn()?;
        let affected = conn
            .execute("DELETE FROM documents WHERE key = ?1", params![key])
            .map_err(|e| ReplayError::Store {
                reason: e.to_string(),
            })?;
        Ok(affected > 0)
    }

    fn list_keys(&self) -> Result<Vec<String>, ReplayError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key FROM documents ORDER BY key")
            .map_err(|e| ReplayError::Store {
                reason: e.to_string(),
            })?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| ReplayError::Store {
                reason: e.to_string(),
            })?
            .collect::<Result<Vec<String>, rusqlite::Error>>()
            .map_err(|e| ReplayError::Store {
                reason: e.to_string(),
            })?;
        Ok(keys)
    }
}

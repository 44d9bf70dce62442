//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::traits::Cacheable;

/// Result of a cached query lookup.
#[derive(Debug, Clone)]
pub struct CachedQueryResult<T> {
  /// The cached entities in order
  pub entities: Vec<T>,
  /// When the query result was cached
  pub cached_at: DateTime<Utc>,
}

/// A single cached entity.
#[derive(Debug, Clone)]
pub struct CachedEntity<T> {
  /// The cached entity
  pub entity: T,
  /// When the entity was cached
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Implementations serialize their own writes; callers never lock.
pub trait CacheStorage: Send + Sync {
  /// Replace the entities of a query result.
  fn store_query_result<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()>;

  /// Get cached entities for a query.
  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>>;

  /// Get a single entity by key.
  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>>;

  /// Store (upsert) a single entity.
  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()>;

  /// Merge entities into an existing query result: entities already present
  /// are updated in place, new ones are appended at the end.
  fn merge_query_result<T: Cacheable>(&self, key: &str, new_entities: &[T]) -> Result<()>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database. Nothing survives the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("openblog").join("cache.db"))
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .conn()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  /// Read the ordered entities of a query while holding the connection.
  fn query_entities<T: Cacheable>(conn: &Connection, key: &str) -> Result<Vec<T>> {
    let mut stmt = conn
      .prepare(
        "SELECT ec.data FROM entity_cache ec
         INNER JOIN query_results qr ON ec.entity_type = ? AND ec.entity_key = qr.entity_key
         WHERE qr.query_hash = ?
         ORDER BY qr.position",
      )
      .map_err(|e| eyre!("Failed to prepare entity query: {}", e))?;

    let entities: Vec<T> = stmt
      .query_map(params![T::entity_type(), key], |row| {
        let data: Vec<u8> = row.get(0)?;
        Ok(data)
      })
      .map_err(|e| eyre!("Failed to query entities: {}", e))?
      .filter_map(|r| r.ok())
      .filter_map(|data| serde_json::from_slice(&data).ok())
      .collect();

    Ok(entities)
  }

  /// Replace a query result while holding the connection.
  fn write_query_result<T: Cacheable>(conn: &Connection, key: &str, entities: &[T]) -> Result<()> {
    let entity_type = T::entity_type();

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let written = (|| -> Result<()> {
      // Delete existing query results
      conn
        .execute(
          "DELETE FROM query_results WHERE query_hash = ?",
          params![key],
        )
        .map_err(|e| eyre!("Failed to delete old query results: {}", e))?;

      conn
        .execute(
          "INSERT OR REPLACE INTO query_cache (query_hash, entity_type, cached_at, result_count)
           VALUES (?, ?, datetime('now'), ?)",
          params![key, entity_type, entities.len()],
        )
        .map_err(|e| eyre!("Failed to update query cache: {}", e))?;

      for (position, entity) in entities.iter().enumerate() {
        Self::write_entity(conn, entity)?;

        conn
          .execute(
            "INSERT OR REPLACE INTO query_results (query_hash, entity_key, position)
             VALUES (?, ?, ?)",
            params![key, entity.cache_key(), position],
          )
          .map_err(|e| eyre!("Failed to store query result: {}", e))?;
      }
      Ok(())
    })();

    match written {
      Ok(()) => {
        conn
          .execute("COMMIT", [])
          .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
        Ok(())
      }
      Err(err) => {
        let _ = conn.execute("ROLLBACK", []);
        Err(err)
      }
    }
  }

  fn write_entity<T: Cacheable>(conn: &Connection, entity: &T) -> Result<()> {
    let data =
      serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, updated_at, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![T::entity_type(), entity.cache_key(), data, entity.updated_at()],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Generic entity cache (stores serialized JSON)
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    updated_at TEXT,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (entity_type, entity_key)
);

CREATE INDEX IF NOT EXISTS idx_entity_cache_updated
    ON entity_cache(entity_type, updated_at);

-- Query result tracking
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    result_count INTEGER NOT NULL
);

-- Query to entity mapping (preserves order)
CREATE TABLE IF NOT EXISTS query_results (
    query_hash TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (query_hash, entity_key),
    FOREIGN KEY (query_hash) REFERENCES query_cache(query_hash) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_query_results_hash ON query_results(query_hash);
"#;

impl CacheStorage for SqliteStorage {
  fn store_query_result<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()> {
    let conn = self.conn()?;
    Self::write_query_result(&conn, key, entities)
  }

  fn get_query_result<T: Cacheable>(
    &self,
    query_hash: &str,
  ) -> Result<Option<CachedQueryResult<T>>> {
    let conn = self.conn()?;

    let cached_at_str: Option<String> = conn
      .query_row(
        "SELECT cached_at FROM query_cache WHERE query_hash = ? AND entity_type = ?",
        params![query_hash, T::entity_type()],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read query cache: {}", e))?;

    let Some(cached_at_str) = cached_at_str else {
      return Ok(None);
    };
    let cached_at = parse_datetime(&cached_at_str)?;
    let entities = Self::query_entities(&conn, query_hash)?;

    Ok(Some(CachedQueryResult {
      entities,
      cached_at,
    }))
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    let conn = self.conn()?;

    let result: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM entity_cache
         WHERE entity_type = ? AND entity_key = ?",
        params![T::entity_type(), entity_key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read entity {}: {}", entity_key, e))?;

    match result {
      Some((data, cached_at_str)) => {
        let entity: T = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize entity: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntity { entity, cached_at }))
      }
      None => Ok(None),
    }
  }

  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()> {
    let conn = self.conn()?;
    Self::write_entity(&conn, entity)
  }

  fn merge_query_result<T: Cacheable>(&self, key: &str, new_entities: &[T]) -> Result<()> {
    let conn = self.conn()?;

    let mut merged: Vec<T> = Self::query_entities(&conn, key)?;
    for new_entity in new_entities {
      let entity_key = new_entity.cache_key();
      match merged.iter_mut().find(|e| e.cache_key() == entity_key) {
        // Update existing entity in place
        Some(existing) => *existing = new_entity.clone(),
        None => merged.push(new_entity.clone()),
      }
    }

    Self::write_query_result(&conn, key, &merged)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

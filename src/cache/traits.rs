//! Core traits and types for the caching system.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;

/// Trait for entities that can be cached.
///
/// Implementors must provide a unique cache key and optionally an updated_at timestamp.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Unique identifier for this entity (e.g., account pk, blog post pk)
  fn cache_key(&self) -> String;

  /// Last modification timestamp (ISO 8601).
  /// Returns None if the entity doesn't track modification time.
  fn updated_at(&self) -> Option<&str>;

  /// Entity type name for storage organization (e.g., "blog_post")
  fn entity_type() -> &'static str;
}

/// Key for a cached query result (a list of entities in order).
pub trait QueryKey {
  /// Stable, fixed-length identifier for the query
  fn cache_hash(&self) -> String;

  /// Human-readable description, used in logs
  fn description(&self) -> String;
}

/// Reactive read of a cached value.
///
/// Holds the latest value (`None` while nothing is cached) and wakes
/// `changed()` whenever the underlying record is rewritten with a different
/// value. Late subscribers see the latest value immediately.
pub type Observable<T> = watch::Receiver<Option<T>>;

/// A persisted store for one entity type, exposed as a reactive source.
pub trait CacheStore<T>: Send + Sync {
  /// Subscribe to the record stored under `key`.
  fn read(&self, key: &str) -> Result<Observable<T>>;

  /// Upsert a record. Writing the same record twice has no further effect.
  fn write(&self, record: &T) -> Result<()>;
}

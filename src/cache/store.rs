//! Reactive stores over a cache storage backend.
//!
//! Each store keeps one `watch` channel per key it has been asked about.
//! Writes go to storage first and are then published to the channel, so
//! every subscriber (including ones that subscribe later) sees the latest
//! persisted value. Writing a value equal to the current one does not wake
//! subscribers.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

use super::storage::{CacheStorage, SqliteStorage};
use super::traits::{CacheStore, Cacheable, Observable, QueryKey};

type Channels<T> = Mutex<HashMap<String, watch::Sender<Option<T>>>>;

fn lock<T>(channels: &Channels<T>) -> Result<MutexGuard<'_, HashMap<String, watch::Sender<Option<T>>>>> {
  channels.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
}

/// Replace the channel value, waking subscribers only on change.
fn publish<T: PartialEq>(tx: &watch::Sender<Option<T>>, value: Option<T>) -> bool {
  tx.send_if_modified(|current| {
    if *current == value {
      false
    } else {
      *current = value;
      true
    }
  })
}

/// Single-record store for one entity type.
pub struct EntityStore<T, S = SqliteStorage> {
  storage: Arc<S>,
  channels: Channels<T>,
}

impl<T, S> EntityStore<T, S>
where
  T: Cacheable + PartialEq,
  S: CacheStorage,
{
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      channels: Mutex::new(HashMap::new()),
    }
  }
}

impl<T, S> CacheStore<T> for EntityStore<T, S>
where
  T: Cacheable + PartialEq,
  S: CacheStorage,
{
  fn read(&self, key: &str) -> Result<Observable<T>> {
    let mut channels = lock(&self.channels)?;
    if let Some(tx) = channels.get(key) {
      return Ok(tx.subscribe());
    }

    let current = self.storage.get_entity::<T>(key)?.map(|cached| cached.entity);
    let (tx, rx) = watch::channel(current);
    channels.insert(key.to_string(), tx);

    Ok(rx)
  }

  fn write(&self, record: &T) -> Result<()> {
    // Held across the upsert: channel and storage must agree on the last writer
    let channels = lock(&self.channels)?;
    self.storage.store_entity(record)?;

    let key = record.cache_key();
    if let Some(tx) = channels.get(&key) {
      let changed = publish(tx, Some(record.clone()));
      debug!(entity = T::entity_type(), key = %key, changed, "Cached entity");
    }

    Ok(())
  }
}

/// Ordered query-result store for one entity type.
pub struct QueryStore<T, S = SqliteStorage> {
  storage: Arc<S>,
  channels: Channels<Vec<T>>,
  _entity: PhantomData<fn() -> T>,
}

impl<T, S> QueryStore<T, S>
where
  T: Cacheable + PartialEq,
  S: CacheStorage,
{
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      channels: Mutex::new(HashMap::new()),
      _entity: PhantomData,
    }
  }

  /// Subscribe to the cached result of `key`.
  pub fn read<K: QueryKey>(&self, key: &K) -> Result<Observable<Vec<T>>> {
    let hash = key.cache_hash();
    let mut channels = lock(&self.channels)?;
    if let Some(tx) = channels.get(&hash) {
      return Ok(tx.subscribe());
    }

    let current = self
      .storage
      .get_query_result::<T>(&hash)?
      .map(|cached| cached.entities);
    let (tx, rx) = watch::channel(current);
    channels.insert(hash, tx);

    Ok(rx)
  }

  /// Write one page of results. Page 1 replaces the cached result, later
  /// pages are merged into it.
  pub fn write_page<K: QueryKey>(&self, key: &K, page: u32, entities: &[T]) -> Result<()> {
    let hash = key.cache_hash();
    let channels = lock(&self.channels)?;
    if page <= 1 {
      self.storage.store_query_result(&hash, entities)?;
    } else {
      self.storage.merge_query_result(&hash, entities)?;
    }

    if let Some(tx) = channels.get(&hash) {
      let current = self
        .storage
        .get_query_result::<T>(&hash)?
        .map(|cached| cached.entities);
      let changed = publish(tx, current);
      debug!(
        query = %key.description(),
        page,
        count = entities.len(),
        changed,
        "Cached query page"
      );
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Note {
    id: u32,
    text: String,
  }

  impl Cacheable for Note {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn updated_at(&self) -> Option<&str> {
      None
    }

    fn entity_type() -> &'static str {
      "note"
    }
  }

  struct NotesQuery(&'static str);

  impl QueryKey for NotesQuery {
    fn cache_hash(&self) -> String {
      format!("notes:{}", self.0)
    }

    fn description(&self) -> String {
      format!("notes matching {}", self.0)
    }
  }

  fn note(id: u32, text: &str) -> Note {
    Note {
      id,
      text: text.to_string(),
    }
  }

  fn storage() -> Arc<SqliteStorage> {
    Arc::new(SqliteStorage::open_in_memory().unwrap())
  }

  /// SQLite storage that stalls after upserting a note whose text is `slow`.
  struct StallingStorage {
    inner: SqliteStorage,
    stall: std::time::Duration,
  }

  impl CacheStorage for StallingStorage {
    fn store_query_result<E: Cacheable>(&self, key: &str, entities: &[E]) -> Result<()> {
      self.inner.store_query_result(key, entities)
    }

    fn get_query_result<E: Cacheable>(
      &self,
      key: &str,
    ) -> Result<Option<crate::cache::CachedQueryResult<E>>> {
      self.inner.get_query_result(key)
    }

    fn get_entity<E: Cacheable>(&self, entity_key: &str) -> Result<Option<crate::cache::CachedEntity<E>>> {
      self.inner.get_entity(entity_key)
    }

    fn store_entity<E: Cacheable>(&self, entity: &E) -> Result<()> {
      self.inner.store_entity(entity)?;
      if serde_json::to_string(entity)?.contains("\"slow\"") {
        std::thread::sleep(self.stall);
      }
      Ok(())
    }

    fn merge_query_result<E: Cacheable>(&self, key: &str, new_entities: &[E]) -> Result<()> {
      self.inner.merge_query_result(key, new_entities)
    }
  }

  #[test]
  fn test_read_missing_record_is_none() {
    let store: EntityStore<Note> = EntityStore::new(storage());
    let rx = store.read("1").unwrap();
    assert_eq!(*rx.borrow(), None);
  }

  #[tokio::test]
  async fn test_write_reemits_to_subscribers() {
    let store: EntityStore<Note> = EntityStore::new(storage());
    let mut rx = store.read("1").unwrap();

    store.write(&note(1, "hello")).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(1), rx.changed())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(*rx.borrow_and_update(), Some(note(1, "hello")));
  }

  #[test]
  fn test_identical_write_does_not_notify() {
    let store: EntityStore<Note> = EntityStore::new(storage());
    let mut rx = store.read("1").unwrap();

    store.write(&note(1, "hello")).unwrap();
    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();

    store.write(&note(1, "hello")).unwrap();
    assert!(!rx.has_changed().unwrap());
    assert_eq!(*rx.borrow(), Some(note(1, "hello")));
  }

  #[test]
  fn test_late_subscriber_sees_latest_value() {
    let shared = storage();
    let store: EntityStore<Note> = EntityStore::new(Arc::clone(&shared));
    let _early = store.read("1").unwrap();
    store.write(&note(1, "v2")).unwrap();

    let late = store.read("1").unwrap();
    assert_eq!(*late.borrow(), Some(note(1, "v2")));

    // Fresh store over the same storage reads the persisted value
    let other: EntityStore<Note> = EntityStore::new(shared);
    assert_eq!(*other.read("1").unwrap().borrow(), Some(note(1, "v2")));
  }

  #[test]
  fn test_query_pages_replace_then_merge() {
    let store: QueryStore<Note> = QueryStore::new(storage());
    let key = NotesQuery("all");
    let rx = store.read(&key).unwrap();
    assert_eq!(*rx.borrow(), None);

    store
      .write_page(&key, 1, &[note(1, "a"), note(2, "b")])
      .unwrap();
    store.write_page(&key, 2, &[note(3, "c")]).unwrap();
    assert_eq!(
      *rx.borrow(),
      Some(vec![note(1, "a"), note(2, "b"), note(3, "c")])
    );

    store.write_page(&key, 1, &[note(9, "z")]).unwrap();
    assert_eq!(*rx.borrow(), Some(vec![note(9, "z")]));
  }

  #[test]
  fn test_query_write_without_subscribers_persists() {
    let shared = storage();
    let store: QueryStore<Note> = QueryStore::new(Arc::clone(&shared));
    let key = NotesQuery("all");

    store.write_page(&key, 1, &[note(1, "a")]).unwrap();

    let rx = store.read(&key).unwrap();
    assert_eq!(*rx.borrow(), Some(vec![note(1, "a")]));
  }

  #[test]
  fn test_concurrent_writes_leave_subscribers_on_persisted_value() {
    let storage = Arc::new(StallingStorage {
      inner: SqliteStorage::open_in_memory().unwrap(),
      stall: std::time::Duration::from_millis(200),
    });
    let store: Arc<EntityStore<Note, StallingStorage>> = Arc::new(EntityStore::new(Arc::clone(&storage)));
    let rx = store.read("1").unwrap();

    let slow_writer = Arc::clone(&store);
    let slow = std::thread::spawn(move || slow_writer.write(&note(1, "slow")).unwrap());
    std::thread::sleep(std::time::Duration::from_millis(50));
    store.write(&note(1, "fast")).unwrap();
    slow.join().unwrap();

    let persisted = storage.get_entity::<Note>("1").unwrap().map(|cached| cached.entity);
    assert_eq!(*rx.borrow(), persisted);
    assert!(persisted.is_some());
  }
}

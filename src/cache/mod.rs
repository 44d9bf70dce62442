//! Generic caching layer for data persistence and offline support.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Caches entities with key + updated_at fields
//! - Handles ordered query results (e.g. search pages)
//! - Exposes records as reactive sources that re-emit on change

mod storage;
mod store;
mod traits;

pub use storage::{CacheStorage, CachedEntity, CachedQueryResult, SqliteStorage};
pub use store::{EntityStore, QueryStore};
pub use traits::{CacheStore, Cacheable, Observable, QueryKey};

//! Caching implementations for blog service types.

use sha2::{Digest, Sha256};

use crate::cache::{Cacheable, QueryKey};

use super::types::{AccountProperties, BlogPost};

/// Sort blog posts by last update
pub const ORDER_BY_DATE_UPDATED: &str = "date_updated";
/// Sort blog posts by author
pub const ORDER_BY_USERNAME: &str = "username";
/// Descending order prefix
pub const BLOG_ORDER_DESC: &str = "-";
/// Ascending order prefix
pub const BLOG_ORDER_ASC: &str = "";

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for AccountProperties {
  fn cache_key(&self) -> String {
    self.pk.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    // Account properties don't have an updated_at field
    None
  }

  fn entity_type() -> &'static str {
    "account_properties"
  }
}

impl Cacheable for BlogPost {
  fn cache_key(&self) -> String {
    self.pk.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    Some(&self.date_updated)
  }

  fn entity_type() -> &'static str {
    "blog_post"
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// A blog search: free-text query plus sort field and direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlogQueryKey {
  pub query: String,
  pub filter: String,
  pub order: String,
}

impl BlogQueryKey {
  pub fn new(query: impl Into<String>, filter: impl Into<String>, order: impl Into<String>) -> Self {
    Self {
      query: query.into(),
      filter: filter.into(),
      order: order.into(),
    }
  }

  /// The `ordering` parameter understood by the service, e.g. `-date_updated`.
  pub fn ordering(&self) -> String {
    format!("{}{}", self.order, self.filter)
  }
}

impl Default for BlogQueryKey {
  fn default() -> Self {
    Self::new("", ORDER_BY_DATE_UPDATED, BLOG_ORDER_DESC)
  }
}

impl QueryKey for BlogQueryKey {
  fn cache_hash(&self) -> String {
    let input = format!(
      "blog_search:{}:{}",
      normalize_query(&self.query),
      self.ordering()
    );

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn description(&self) -> String {
    if self.query.is_empty() {
      format!("all blog posts by {}", self.ordering())
    } else {
      format!("blog posts matching '{}' by {}", self.query, self.ordering())
    }
  }
}

/// Normalize a search query for consistent hashing.
/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize_query(query: &str) -> String {
  query.trim().to_lowercase()
}

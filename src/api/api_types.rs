//! Serde-deserializable types matching blog service responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use crate::models::BlogPost;

// ============================================================================
// Blog search endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiBlogPost {
  pub pk: i64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub slug: String,
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub image: String,
  #[serde(default)]
  pub date_updated: String,
  #[serde(default)]
  pub username: String,
}

impl From<ApiBlogPost> for BlogPost {
  fn from(post: ApiBlogPost) -> Self {
    BlogPost {
      pk: post.pk,
      title: post.title,
      slug: post.slug,
      body: post.body,
      image: post.image,
      date_updated: post.date_updated,
      username: post.username,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiBlogListResponse {
  #[serde(default)]
  pub results: Vec<ApiBlogPost>,
  #[serde(default)]
  pub detail: Option<String>,
}

impl ApiBlogListResponse {
  pub fn into_posts(self) -> Vec<BlogPost> {
    self.results.into_iter().map(BlogPost::from).collect()
  }
}

// ============================================================================
// Error bodies
// ============================================================================

/// The service reports errors in a few shapes; whichever field is present
/// carries the message.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  pub error_message: Option<String>,
  pub detail: Option<String>,
  pub response: Option<String>,
}

impl ApiErrorBody {
  pub fn message(self) -> Option<String> {
    self
      .error_message
      .or(self.detail)
      .or(self.response)
      .filter(|m| !m.trim().is_empty())
  }
}

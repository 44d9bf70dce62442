//! Remote source for the blog service.
//!
//! [`OpenApiService`] is the seam the repositories call through; [`ApiClient`]
//! is the HTTP implementation. Every method yields exactly one [`ApiOutcome`],
//! transport faults included.

pub mod api_types;
mod client;

use async_trait::async_trait;

use crate::mediator::ApiOutcome;
use crate::models::{AccountProperties, AuthToken, BlogPost, GenericResponse};

pub use client::{ApiClient, ERROR_CHECK_NETWORK_CONNECTION, ERROR_NETWORK_TIMEOUT, ERROR_UNKNOWN};

/// Message returned by `blog/{slug}/is_author` when the caller wrote the post
pub const RESPONSE_HAS_PERMISSION_TO_EDIT: &str = "You have permission to edit that.";

#[async_trait]
pub trait OpenApiService: Send + Sync {
  async fn get_account_properties(&self, auth: &AuthToken) -> ApiOutcome<AccountProperties>;

  async fn save_account_properties(
    &self,
    auth: &AuthToken,
    email: &str,
    username: &str,
  ) -> ApiOutcome<GenericResponse>;

  async fn update_password(
    &self,
    auth: &AuthToken,
    current_password: &str,
    new_password: &str,
    confirm_new_password: &str,
  ) -> ApiOutcome<GenericResponse>;

  /// One page of search results; `ordering` is e.g. `-date_updated`.
  async fn search_blog_posts(
    &self,
    auth: &AuthToken,
    query: &str,
    ordering: &str,
    page: u32,
  ) -> ApiOutcome<Vec<BlogPost>>;

  async fn is_author_of_blog_post(&self, auth: &AuthToken, slug: &str) -> ApiOutcome<GenericResponse>;
}

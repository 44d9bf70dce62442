use serde::{Deserialize, Serialize};

/// Opaque credential for the blog service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
  pub account_pk: i64,
  pub token: String,
}

impl AuthToken {
  /// Value for the `Authorization` header
  pub fn header_value(&self) -> String {
    format!("Token {}", self.token)
  }
}

/// Account properties of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProperties {
  pub pk: i64,
  pub email: String,
  pub username: String,
}

/// A blog post as shown in lists and detail views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
  pub pk: i64,
  pub title: String,
  pub slug: String,
  pub body: String,
  pub image: String,
  pub date_updated: String,
  pub username: String,
}

/// Acknowledgement returned by command endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenericResponse {
  pub response: String,
}

/// Account screen view
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountView {
  pub account_properties: Option<AccountProperties>,
}

impl From<AccountProperties> for AccountView {
  fn from(account_properties: AccountProperties) -> Self {
    Self {
      account_properties: Some(account_properties),
    }
  }
}

/// Blog list view for one search
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlogListView {
  pub posts: Vec<BlogPost>,
  pub page: u32,
  pub is_query_exhausted: bool,
}

/// Whether the signed-in user may edit a blog post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorshipView {
  pub is_author: bool,
}

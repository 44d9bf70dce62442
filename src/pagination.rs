//! Page bookkeeping for blog search.
//!
//! The paginator only decides *which* page to load next; the caller runs the
//! search for that page and feeds every resulting state back through
//! [`BlogPaginator::handle_incoming`].

use tracing::debug;

use crate::mediator::LifecycleState;
use crate::models::{BlogListView, BlogPost, BlogQueryKey};

#[derive(Debug, Clone)]
pub struct BlogPaginator {
  query: BlogQueryKey,
  page: u32,
  posts: Vec<BlogPost>,
  is_query_in_progress: bool,
  is_query_exhausted: bool,
}

impl BlogPaginator {
  pub fn new(query: BlogQueryKey) -> Self {
    Self {
      query,
      page: 1,
      posts: Vec::new(),
      is_query_in_progress: false,
      is_query_exhausted: false,
    }
  }

  pub fn query(&self) -> &BlogQueryKey {
    &self.query
  }

  /// The page being loaded, or the last one loaded. Zero when the first
  /// page has not loaded.
  pub fn page(&self) -> u32 {
    self.page
  }

  pub fn posts(&self) -> &[BlogPost] {
    &self.posts
  }

  pub fn is_query_in_progress(&self) -> bool {
    self.is_query_in_progress
  }

  pub fn is_query_exhausted(&self) -> bool {
    self.is_query_exhausted
  }

  /// Switch to another search. Takes effect with the next `load_first_page`.
  pub fn set_query(&mut self, query: BlogQueryKey) {
    self.query = query;
  }

  /// Start the search over from page 1. Always returns 1.
  pub fn load_first_page(&mut self) -> u32 {
    self.is_query_in_progress = true;
    self.is_query_exhausted = false;
    self.page = 1;
    self.page
  }

  /// Advance to the next page, unless the search is exhausted or a page is
  /// still loading.
  pub fn next_page(&mut self) -> Option<u32> {
    if self.is_query_exhausted || self.is_query_in_progress {
      return None;
    }
    self.page += 1;
    self.is_query_in_progress = true;
    debug!(page = self.page, query = %self.query.query, "Loading next page");
    Some(self.page)
  }

  /// Apply a state produced by the search for the current page.
  ///
  /// `Loading` changes nothing. A terminal state ends the page load; if it
  /// carries a list, that list and its exhaustion flag are adopted. An error
  /// rolls the page back so `next_page` asks for the failed page again.
  pub fn handle_incoming(&mut self, state: &LifecycleState<BlogListView>) {
    match state {
      LifecycleState::Loading { .. } => {}
      LifecycleState::ErrorOccurred { .. } => self.abandon_page(),
      LifecycleState::DataAvailable { view, .. } => {
        self.is_query_in_progress = false;
        if let Some(view) = view {
          self.posts = view.posts.clone();
          self.is_query_exhausted = view.is_query_exhausted;
        }
      }
    }
  }

  /// Call once the search stream for the current page has ended. A stream
  /// that ended without a terminal state was cancelled or superseded; the
  /// page is rolled back just like a failed one.
  pub fn handle_stream_end(&mut self) {
    if self.is_query_in_progress {
      self.abandon_page();
    }
  }

  fn abandon_page(&mut self) {
    debug!(page = self.page, query = %self.query.query, "Page load abandoned");
    self.is_query_in_progress = false;
    self.page = self.page.saturating_sub(1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mediator::{DisplayHint, MediatorError};
  use crate::repository::blog_list_view;

  fn posts(count: i64) -> Vec<BlogPost> {
    (1..=count)
      .map(|pk| BlogPost {
        pk,
        title: String::new(),
        slug: String::new(),
        body: String::new(),
        image: String::new(),
        date_updated: String::new(),
        username: String::new(),
      })
      .collect()
  }

  fn data(view: BlogListView) -> LifecycleState<BlogListView> {
    LifecycleState::DataAvailable {
      view: Some(view),
      info: None,
    }
  }

  #[test]
  fn test_next_page_waits_for_current_page() {
    let mut paginator = BlogPaginator::new(BlogQueryKey::default());
    assert_eq!(paginator.load_first_page(), 1);
    assert_eq!(paginator.next_page(), None);

    paginator.handle_incoming(&data(blog_list_view(posts(10), 1, 10)));
    assert!(!paginator.is_query_in_progress());
    assert_eq!(paginator.posts().len(), 10);
    assert_eq!(paginator.next_page(), Some(2));
    assert!(paginator.is_query_in_progress());
  }

  #[test]
  fn test_exhausted_query_stops_paging() {
    let mut paginator = BlogPaginator::new(BlogQueryKey::default());
    paginator.load_first_page();
    paginator.handle_incoming(&data(blog_list_view(posts(4), 1, 10)));

    assert!(paginator.is_query_exhausted());
    assert_eq!(paginator.next_page(), None);
    assert_eq!(paginator.page(), 1);
  }

  #[test]
  fn test_loading_state_keeps_page_in_progress() {
    let mut paginator = BlogPaginator::new(BlogQueryKey::default());
    paginator.load_first_page();
    paginator.handle_incoming(&LifecycleState::Loading {
      progress: None,
      cancellable: true,
      cached: None,
    });
    assert!(paginator.is_query_in_progress());
  }

  fn failure() -> LifecycleState<BlogListView> {
    LifecycleState::ErrorOccurred {
      error: MediatorError::NetworkFailure {
        status: 500,
        message: "Internal Server Error".to_string(),
      },
      notification: crate::mediator::Notification::new("Internal Server Error", DisplayHint::Dialog),
    }
  }

  #[test]
  fn test_failed_first_page_is_retried() {
    let mut paginator = BlogPaginator::new(BlogQueryKey::default());
    paginator.load_first_page();
    paginator.handle_incoming(&failure());

    assert!(!paginator.is_query_in_progress());
    assert!(!paginator.is_query_exhausted());
    assert_eq!(paginator.next_page(), Some(1));
  }

  #[test]
  fn test_failed_later_page_is_retried() {
    let mut paginator = BlogPaginator::new(BlogQueryKey::default());
    paginator.load_first_page();
    paginator.handle_incoming(&data(blog_list_view(posts(10), 1, 10)));
    assert_eq!(paginator.next_page(), Some(2));

    paginator.handle_incoming(&failure());
    assert_eq!(paginator.page(), 1);
    assert_eq!(paginator.posts().len(), 10);
    assert_eq!(paginator.next_page(), Some(2));
  }

  #[test]
  fn test_stream_ending_without_terminal_state_releases_page() {
    let mut paginator = BlogPaginator::new(BlogQueryKey::default());
    paginator.load_first_page();
    paginator.handle_incoming(&LifecycleState::Loading {
      progress: None,
      cancellable: true,
      cached: None,
    });
    paginator.handle_stream_end();

    assert!(!paginator.is_query_in_progress());
    assert_eq!(paginator.next_page(), Some(1));
  }

  #[test]
  fn test_stream_end_after_data_keeps_page() {
    let mut paginator = BlogPaginator::new(BlogQueryKey::default());
    paginator.load_first_page();
    paginator.handle_incoming(&data(blog_list_view(posts(10), 1, 10)));
    paginator.handle_stream_end();

    assert_eq!(paginator.page(), 1);
    assert_eq!(paginator.next_page(), Some(2));
  }

  #[test]
  fn test_first_page_resets_exhaustion() {
    let mut paginator = BlogPaginator::new(BlogQueryKey::default());
    paginator.load_first_page();
    paginator.handle_incoming(&data(blog_list_view(posts(1), 1, 10)));
    assert!(paginator.is_query_exhausted());

    paginator.set_query(BlogQueryKey::new("rust", "username", ""));
    assert_eq!(paginator.load_first_page(), 1);
    assert!(!paginator.is_query_exhausted());
    assert_eq!(paginator.query().query, "rust");
  }
}

use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::api::{OpenApiService, RESPONSE_HAS_PERMISSION_TO_EDIT};
use crate::cache::{QueryStore, SqliteStorage};
use crate::connectivity::ConnectivityOracle;
use crate::mediator::{LifecycleStream, Operation, OperationConfig, ResourceMediator};
use crate::models::{AuthToken, AuthorshipView, BlogListView, BlogPost, BlogQueryKey, GenericResponse};

/// Shared by every page of every search, so a newer search supersedes
/// whichever page load is still in flight.
pub const JOB_SEARCH_BLOG_POSTS: &str = "search_blog_posts";
pub const JOB_RESTORE_BLOG_LIST_FROM_CACHE: &str = "restore_blog_list_from_cache";
pub const JOB_IS_AUTHOR_OF_BLOG_POST: &str = "is_author_of_blog_post";

/// Build the list view for `page`. The query is exhausted once the
/// accumulated list falls short of a full set of pages.
pub fn blog_list_view(posts: Vec<BlogPost>, page: u32, page_size: usize) -> BlogListView {
  let is_query_exhausted = posts.len() < (page.max(1) as usize).saturating_mul(page_size);
  BlogListView {
    posts,
    page,
    is_query_exhausted,
  }
}

/// Blog search and authorship checks.
pub struct BlogRepository {
  mediator: ResourceMediator,
  service: Arc<dyn OpenApiService>,
  posts: Arc<QueryStore<BlogPost>>,
  connectivity: Arc<dyn ConnectivityOracle>,
  page_size: usize,
}

impl BlogRepository {
  pub fn new(
    service: Arc<dyn OpenApiService>,
    storage: Arc<SqliteStorage>,
    connectivity: Arc<dyn ConnectivityOracle>,
    page_size: usize,
  ) -> Self {
    Self {
      mediator: ResourceMediator::new("BlogRepository"),
      service,
      posts: Arc::new(QueryStore::new(storage)),
      connectivity,
      page_size,
    }
  }

  pub fn mediator(&self) -> &ResourceMediator {
    &self.mediator
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// Load one page of a search. The page is merged into the cached result
  /// for the query and the whole accumulated list is returned.
  pub async fn search_blog_posts(
    &self,
    auth: &AuthToken,
    query: &BlogQueryKey,
    page: u32,
  ) -> Result<LifecycleStream<BlogListView>> {
    let config = OperationConfig::network(self.connectivity.is_connected().await)
      .cancel_if_offline(false)
      .load_from_cache_first(false);

    let reader = Arc::clone(&self.posts);
    let writer = Arc::clone(&self.posts);
    let service = Arc::clone(&self.service);
    let page_size = self.page_size;
    let read_key = query.clone();
    let write_key = query.clone();
    let query = query.clone();
    let auth = auth.clone();

    let operation = Operation::<Vec<BlogPost>, Vec<BlogPost>, BlogListView>::builder(
      JOB_SEARCH_BLOG_POSTS,
      config,
    )
    .load_from_cache(
      move || reader.read(&read_key),
      move |posts| blog_list_view(posts, page, page_size),
    )
    .update_local_cache(move |posts: &Vec<BlogPost>| writer.write_page(&write_key, page, posts))
    .create_call(move || async move {
      service
        .search_blog_posts(&auth, &query.query, &query.ordering(), page)
        .await
    })
    .build()?;

    Ok(self.mediator.invoke(operation))
  }

  /// Show whatever the cache holds for a search, without touching the
  /// network. The restored list is marked exhausted so paging stops there.
  pub async fn restore_blog_list_from_cache(
    &self,
    query: &BlogQueryKey,
    page: u32,
  ) -> Result<LifecycleStream<BlogListView>> {
    let config = OperationConfig::cache_only(self.connectivity.is_connected().await);

    let reader = Arc::clone(&self.posts);
    let key = query.clone();

    let operation = Operation::<Vec<BlogPost>, (), BlogListView>::builder(
      JOB_RESTORE_BLOG_LIST_FROM_CACHE,
      config,
    )
    .load_from_cache(
      move || reader.read(&key),
      move |posts| BlogListView {
        posts,
        page,
        is_query_exhausted: true,
      },
    )
    .build()?;

    Ok(self.mediator.invoke(operation))
  }

  /// Ask the service whether the signed-in account wrote `slug`.
  pub async fn is_author_of_blog_post(
    &self,
    auth: &AuthToken,
    slug: &str,
  ) -> Result<LifecycleStream<AuthorshipView>> {
    let config = OperationConfig::network(self.connectivity.is_connected().await)
      .cancel_if_offline(true)
      .load_from_cache_first(false);

    let service = Arc::clone(&self.service);
    let auth = auth.clone();
    let slug = slug.to_string();

    let operation = Operation::<(), GenericResponse, AuthorshipView>::builder(
      JOB_IS_AUTHOR_OF_BLOG_POST,
      config,
    )
    .create_call(move || async move { service.is_author_of_blog_post(&auth, &slug).await })
    .finish_from_response(|response: GenericResponse| {
      let is_author = response.response == RESPONSE_HAS_PERMISSION_TO_EDIT;
      (Some(AuthorshipView { is_author }), None)
    })
    .build()?;

    Ok(self.mediator.invoke(operation))
  }

  pub fn cancel_active_jobs(&self) {
    debug!(
      active = self.mediator.jobs().active_count(),
      "Cancelling blog jobs"
    );
    self.mediator.cancel_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::connectivity::ManualConnectivity;
  use crate::mediator::{ApiOutcome, LifecycleState, MediatorError};
  use crate::repository::testing::{auth, post, FakeService};
  use futures::StreamExt;
  use std::time::Duration;
  use tokio::sync::Notify;

  fn repository(service: Arc<FakeService>, online: bool) -> BlogRepository {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    BlogRepository::new(service, storage, Arc::new(ManualConnectivity::new(online)), 2)
  }

  async fn collect<V: Send + 'static>(stream: LifecycleStream<V>) -> Vec<LifecycleState<V>> {
    tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>())
      .await
      .expect("stream did not finish")
  }

  fn posts(pks: &[i64]) -> Vec<BlogPost> {
    pks.iter().copied().map(post).collect()
  }

  fn pks(view: &BlogListView) -> Vec<i64> {
    view.posts.iter().map(|p| p.pk).collect()
  }

  #[test]
  fn test_blog_list_view_exhaustion() {
    assert!(!blog_list_view(posts(&[1, 2]), 1, 2).is_query_exhausted);
    assert!(blog_list_view(posts(&[1, 2, 3]), 2, 2).is_query_exhausted);
    assert!(blog_list_view(Vec::new(), 1, 10).is_query_exhausted);
  }

  #[tokio::test]
  async fn test_search_accumulates_pages() {
    let service = Arc::new(FakeService::default());
    {
      let mut search = service.search.lock().unwrap();
      search.push_back(ApiOutcome::Success {
        body: posts(&[1, 2]),
        status: 200,
      });
      search.push_back(ApiOutcome::Success {
        body: posts(&[3]),
        status: 200,
      });
    }
    let repository = repository(Arc::clone(&service), true);
    let key = BlogQueryKey::new("rust", "date_updated", "-");

    let first = collect(repository.search_blog_posts(&auth(), &key, 1).await.unwrap()).await;
    let view = first.last().and_then(|s| s.view()).unwrap();
    assert_eq!(pks(view), vec![1, 2]);
    assert!(!view.is_query_exhausted);

    let second = collect(repository.search_blog_posts(&auth(), &key, 2).await.unwrap()).await;
    let view = second.last().and_then(|s| s.view()).unwrap();
    assert_eq!(pks(view), vec![1, 2, 3]);
    assert_eq!(view.page, 2);
    assert!(view.is_query_exhausted);

    assert_eq!(
      service.calls(),
      vec![
        "search_blog_posts:rust:-date_updated:1",
        "search_blog_posts:rust:-date_updated:2"
      ]
    );
  }

  #[tokio::test]
  async fn test_first_page_replaces_cached_result() {
    let service = Arc::new(FakeService::default());
    {
      let mut search = service.search.lock().unwrap();
      search.push_back(ApiOutcome::Success {
        body: posts(&[1, 2]),
        status: 200,
      });
      search.push_back(ApiOutcome::Success {
        body: posts(&[5]),
        status: 200,
      });
    }
    let repository = repository(Arc::clone(&service), true);
    let key = BlogQueryKey::default();

    collect(repository.search_blog_posts(&auth(), &key, 1).await.unwrap()).await;
    let refreshed = collect(repository.search_blog_posts(&auth(), &key, 1).await.unwrap()).await;

    let view = refreshed.last().and_then(|s| s.view()).unwrap();
    assert_eq!(pks(view), vec![5]);
  }

  #[tokio::test]
  async fn test_restore_from_cache_never_calls_service() {
    let service = Arc::new(FakeService::default());
    service.search.lock().unwrap().push_back(ApiOutcome::Success {
      body: posts(&[1, 2]),
      status: 200,
    });
    let repository = repository(Arc::clone(&service), false);
    let key = BlogQueryKey::default();

    // Offline search still goes out since it does not cancel when offline
    collect(repository.search_blog_posts(&auth(), &key, 1).await.unwrap()).await;
    let calls_before = service.calls().len();

    let states = collect(repository.restore_blog_list_from_cache(&key, 1).await.unwrap()).await;

    assert_eq!(service.calls().len(), calls_before);
    assert_eq!(states.len(), 2);
    assert!(states[0].is_loading());
    let view = states[1].view().unwrap();
    assert_eq!(pks(view), vec![1, 2]);
    assert!(view.is_query_exhausted);
  }

  #[tokio::test]
  async fn test_restore_with_empty_cache() {
    let service = Arc::new(FakeService::default());
    let repository = repository(Arc::clone(&service), true);

    let states = collect(
      repository
        .restore_blog_list_from_cache(&BlogQueryKey::default(), 1)
        .await
        .unwrap(),
    )
    .await;

    assert_eq!(
      states.last(),
      Some(&LifecycleState::DataAvailable {
        view: None,
        info: None
      })
    );
  }

  #[tokio::test]
  async fn test_newer_search_supersedes_older() {
    let gate = Arc::new(Notify::new());
    let service = Arc::new(FakeService {
      search_gate: Some(Arc::clone(&gate)),
      ..FakeService::default()
    });
    service.search.lock().unwrap().push_back(ApiOutcome::Success {
      body: posts(&[9]),
      status: 200,
    });
    let repository = repository(Arc::clone(&service), true);

    let older = repository
      .search_blog_posts(&auth(), &BlogQueryKey::new("old", "date_updated", "-"), 1)
      .await
      .unwrap();
    let older = tokio::spawn(older.collect::<Vec<_>>());
    wait_for_calls(&service, 1).await;

    let newer = repository
      .search_blog_posts(&auth(), &BlogQueryKey::new("new", "date_updated", "-"), 1)
      .await
      .unwrap();
    let newer = tokio::spawn(newer.collect::<Vec<_>>());
    wait_for_calls(&service, 2).await;

    let older_states = tokio::time::timeout(Duration::from_secs(5), older)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(older_states.len(), 1);
    assert!(older_states[0].is_loading());

    gate.notify_one();
    let newer_states = tokio::time::timeout(Duration::from_secs(5), newer)
      .await
      .unwrap()
      .unwrap();
    let view = newer_states.last().and_then(|s| s.view()).unwrap();
    assert_eq!(pks(view), vec![9]);
    assert!(!repository.mediator().jobs().is_active(JOB_SEARCH_BLOG_POSTS));
  }

  #[tokio::test]
  async fn test_cancel_active_jobs_silences_search() {
    let gate = Arc::new(Notify::new());
    let service = Arc::new(FakeService {
      search_gate: Some(gate),
      ..FakeService::default()
    });
    let repository = repository(Arc::clone(&service), true);

    let stream = repository
      .search_blog_posts(&auth(), &BlogQueryKey::default(), 1)
      .await
      .unwrap();
    let task = tokio::spawn(stream.collect::<Vec<_>>());
    wait_for_calls(&service, 1).await;

    repository.cancel_active_jobs();

    let states = tokio::time::timeout(Duration::from_secs(5), task)
      .await
      .unwrap()
      .unwrap();
    assert!(states.iter().all(|s| s.is_loading()));
    assert_eq!(repository.mediator().jobs().active_count(), 0);
  }

  #[tokio::test]
  async fn test_is_author() {
    let service = Arc::new(FakeService::default());
    {
      let mut generic = service.generic.lock().unwrap();
      generic.push_back(ApiOutcome::Success {
        body: GenericResponse {
          response: RESPONSE_HAS_PERMISSION_TO_EDIT.to_string(),
        },
        status: 200,
      });
      generic.push_back(ApiOutcome::Success {
        body: GenericResponse {
          response: "You don't have permission to edit that.".to_string(),
        },
        status: 200,
      });
    }
    let repository = repository(Arc::clone(&service), true);

    let states = collect(repository.is_author_of_blog_post(&auth(), "post-1").await.unwrap()).await;
    assert_eq!(
      states.last().and_then(|s| s.view()),
      Some(&AuthorshipView { is_author: true })
    );

    let states = collect(repository.is_author_of_blog_post(&auth(), "post-2").await.unwrap()).await;
    assert_eq!(
      states.last().and_then(|s| s.view()),
      Some(&AuthorshipView { is_author: false })
    );
  }

  #[tokio::test]
  async fn test_is_author_offline_aborts() {
    let service = Arc::new(FakeService::default());
    let repository = repository(Arc::clone(&service), false);

    let states = collect(repository.is_author_of_blog_post(&auth(), "post-1").await.unwrap()).await;

    assert_eq!(states.len(), 1);
    assert_eq!(states[0].error_kind(), Some(&MediatorError::OfflineAbort));
    assert!(service.calls().is_empty());
  }

  async fn wait_for_calls(service: &FakeService, count: usize) {
    for _ in 0..500 {
      if service.calls().len() >= count {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("service never saw {} calls", count);
  }
}

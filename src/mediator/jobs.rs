//! Registry of in-flight operations keyed by name.
//!
//! At most one job lives under a key. Registering a new job under a key that
//! is already taken cancels the old one first, so a newer request always
//! supersedes an older one instead of queueing behind it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle returned by [`JobRegistry::register`].
///
/// Owns a clone of the job's cancellation token and the id that identifies
/// this particular registration under its key.
#[derive(Debug, Clone)]
pub struct JobTicket {
  key: String,
  id: u64,
  token: CancellationToken,
}

impl JobTicket {
  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn token(&self) -> &CancellationToken {
    &self.token
  }

  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }
}

struct JobEntry {
  id: u64,
  token: CancellationToken,
  started_at: Instant,
}

struct Inner {
  namespace: String,
  jobs: Mutex<HashMap<String, JobEntry>>,
  next_id: AtomicU64,
}

/// Tracks cancellable jobs by key.
///
/// Cheap to clone; all clones share the same jobs.
#[derive(Clone)]
pub struct JobRegistry {
  inner: Arc<Inner>,
}

impl JobRegistry {
  /// Create an empty registry. The namespace only shows up in logs.
  pub fn new(namespace: impl Into<String>) -> Self {
    Self {
      inner: Arc::new(Inner {
        namespace: namespace.into(),
        jobs: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(1),
      }),
    }
  }

  pub fn namespace(&self) -> &str {
    &self.inner.namespace
  }

  fn jobs(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
    // The map stays consistent across a panic in another holder.
    self
      .inner
      .jobs
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Register a new job under `key`, cancelling any job already there.
  ///
  /// When `parent` is given the job's token is a child of it, so cancelling
  /// the parent cancels the job as well.
  pub fn register(&self, key: &str, parent: Option<&CancellationToken>) -> JobTicket {
    let token = match parent {
      Some(parent) => parent.child_token(),
      None => CancellationToken::new(),
    };
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

    let mut jobs = self.jobs();
    if let Some(previous) = jobs.remove(key) {
      previous.token.cancel();
      debug!(
        namespace = %self.inner.namespace,
        key,
        superseded = previous.id,
        "Superseding in-flight job"
      );
    }
    jobs.insert(
      key.to_string(),
      JobEntry {
        id,
        token: token.clone(),
        started_at: Instant::now(),
      },
    );
    drop(jobs);

    debug!(namespace = %self.inner.namespace, key, id, "Registered job");

    JobTicket {
      key: key.to_string(),
      id,
      token,
    }
  }

  /// Cancel and forget the job under `key`. No-op if there is none.
  pub fn cancel(&self, key: &str) {
    if let Some(entry) = self.jobs().remove(key) {
      entry.token.cancel();
      debug!(
        namespace = %self.inner.namespace,
        key,
        id = entry.id,
        "Cancelled job"
      );
    }
  }

  /// Cancel every tracked job.
  pub fn cancel_all(&self) {
    let drained: Vec<(String, JobEntry)> = self.jobs().drain().collect();
    for (key, entry) in &drained {
      entry.token.cancel();
      debug!(namespace = %self.inner.namespace, key, id = entry.id, "Cancelled job");
    }
  }

  /// Forget the job under `key` without cancelling it.
  pub fn complete(&self, key: &str) {
    if let Some(entry) = self.jobs().remove(key) {
      debug!(
        namespace = %self.inner.namespace,
        key,
        id = entry.id,
        elapsed_ms = entry.started_at.elapsed().as_millis(),
        "Job completed"
      );
    }
  }

  /// Complete the job identified by `ticket`.
  ///
  /// Only removes the entry if it still belongs to this ticket; a superseded
  /// job finishing late must not evict its successor.
  pub fn finish(&self, ticket: &JobTicket) {
    let mut jobs = self.jobs();
    let current = jobs.get(&ticket.key).map(|entry| entry.id);
    if current == Some(ticket.id) {
      if let Some(entry) = jobs.remove(&ticket.key) {
        debug!(
          namespace = %self.inner.namespace,
          key = %ticket.key,
          id = ticket.id,
          elapsed_ms = entry.started_at.elapsed().as_millis(),
          "Job completed"
        );
      }
    }
  }

  /// Returns true if a job is tracked under `key`.
  pub fn is_active(&self, key: &str) -> bool {
    self.jobs().contains_key(key)
  }

  /// Number of jobs currently tracked.
  pub fn active_count(&self) -> usize {
    self.jobs().len()
  }
}

impl std::fmt::Debug for JobRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JobRegistry")
      .field("namespace", &self.inner.namespace)
      .field("active", &self.active_count())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_register_supersedes_existing_job() {
    let registry = JobRegistry::new("test");

    let first = registry.register("load", None);
    assert!(!first.is_cancelled());

    let second = registry.register("load", None);
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert_eq!(registry.active_count(), 1);
    assert!(registry.is_active("load"));
  }

  #[test]
  fn test_different_keys_do_not_interfere() {
    let registry = JobRegistry::new("test");

    let a = registry.register("a", None);
    let b = registry.register("b", None);

    assert!(!a.is_cancelled());
    assert!(!b.is_cancelled());
    assert_eq!(registry.active_count(), 2);
  }

  #[test]
  fn test_cancel_removes_and_cancels() {
    let registry = JobRegistry::new("test");
    let ticket = registry.register("load", None);

    registry.cancel("load");
    assert!(ticket.is_cancelled());
    assert!(!registry.is_active("load"));

    // Cancelling again, or cancelling an unknown key, is a no-op
    registry.cancel("load");
    registry.cancel("missing");
    assert_eq!(registry.active_count(), 0);
  }

  #[test]
  fn test_cancel_all() {
    let registry = JobRegistry::new("test");
    let a = registry.register("a", None);
    let b = registry.register("b", None);

    registry.cancel_all();

    assert!(a.is_cancelled());
    assert!(b.is_cancelled());
    assert_eq!(registry.active_count(), 0);
  }

  #[test]
  fn test_complete_does_not_cancel() {
    let registry = JobRegistry::new("test");
    let ticket = registry.register("load", None);

    registry.complete("load");
    assert!(!ticket.is_cancelled());
    assert!(!registry.is_active("load"));

    // Cancel after completion is a no-op
    registry.cancel("load");
    assert!(!ticket.is_cancelled());
  }

  #[test]
  fn test_finish_stale_ticket_keeps_successor() {
    let registry = JobRegistry::new("test");
    let first = registry.register("load", None);
    let second = registry.register("load", None);

    registry.finish(&first);
    assert!(registry.is_active("load"));

    registry.finish(&second);
    assert!(!registry.is_active("load"));
  }

  #[test]
  fn test_parent_token_cancels_job() {
    let registry = JobRegistry::new("test");
    let parent = CancellationToken::new();
    let ticket = registry.register("load", Some(&parent));

    parent.cancel();
    assert!(ticket.is_cancelled());
  }

  #[tokio::test]
  async fn test_superseded_token_wakes_waiters() {
    let registry = JobRegistry::new("test");
    let first = registry.register("load", None);
    let token = first.token().clone();

    let waiter = tokio::spawn(async move { token.cancelled().await });
    registry.register("load", None);

    tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
      .await
      .expect("waiter should observe cancellation")
      .unwrap();
  }
}

//! Resource mediator: one orchestration for every cache-plus-network read
//! or command.
//!
//! An invocation runs through these steps, in order:
//!
//! 1. Offline abort: a network operation flagged `cancel_if_offline` with no
//!    connectivity ends immediately with `ErrorOccurred(OfflineAbort)`.
//! 2. `Loading`, carrying the cached view when `load_from_cache_first` is set.
//! 3. Cache-only operations finish with the cached view.
//! 4. Network operations start exactly one remote call, registered as a job
//!    under the operation key. A newer job under the same key supersedes it.
//! 5. The outcome is reconciled: a success is written into the cache and the
//!    view is re-read (or derived from the body); an empty success finishes
//!    without a view; a failure ends in `ErrorOccurred`.
//!
//! # Example
//!
//! ```ignore
//! let op = Operation::builder("get_account_properties", OperationConfig::network(online))
//!   .load_from_cache(move || store.read(&pk), AccountView::from)
//!   .update_local_cache(move |props| store.write(props))
//!   .create_call(move || async move { api.get_account_properties(&token).await })
//!   .build()?;
//!
//! let mut states = mediator.invoke(op);
//! while let Some(state) = states.next().await {
//!   render(state);
//! }
//! ```

mod config;
mod error;
mod jobs;
mod operation;
mod outcome;
mod state;

pub use config::OperationConfig;
pub use error::{MediatorError, OFFLINE_ABORT_MESSAGE};
pub use jobs::{JobRegistry, JobTicket};
pub use operation::{Completion, Operation, OperationBuilder};
pub use outcome::{ApiOutcome, TRANSPORT_FAILURE_STATUS};
pub use state::{DisplayHint, DisplayHints, LifecycleState, Notification};

use futures::channel::mpsc;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

/// The observable sequence produced by one invocation.
pub type LifecycleStream<V> = BoxStream<'static, LifecycleState<V>>;

/// Runs operations and tracks their jobs.
///
/// Cheap to clone; clones share the job registry.
#[derive(Clone, Debug)]
pub struct ResourceMediator {
  jobs: JobRegistry,
}

impl ResourceMediator {
  pub fn new(namespace: impl Into<String>) -> Self {
    Self {
      jobs: JobRegistry::new(namespace),
    }
  }

  pub fn jobs(&self) -> &JobRegistry {
    &self.jobs
  }

  /// Cancel the in-flight job under `key`. Its stream ends without a
  /// terminal state.
  pub fn cancel(&self, key: &str) {
    self.jobs.cancel(key);
  }

  /// Cancel every in-flight job.
  pub fn cancel_all(&self) {
    self.jobs.cancel_all();
  }

  /// Turn an operation into a cold stream of lifecycle states.
  ///
  /// Nothing happens until the stream is first polled. The stream yields at
  /// most one `Loading` and then exactly one terminal state, or ends early
  /// if the job is cancelled or superseded.
  pub fn invoke<C, R, V>(&self, operation: Operation<C, R, V>) -> LifecycleStream<V>
  where
    C: Clone + Send + Sync + 'static,
    R: Send + 'static,
    V: Send + 'static,
  {
    let jobs = self.jobs.clone();

    stream::once(async move {
      if operation.config.aborts_offline() {
        warn!(
          namespace = %jobs.namespace(),
          key = %operation.key,
          "Network unavailable, aborting operation"
        );
        let state = LifecycleState::error(MediatorError::OfflineAbort, operation.hints.error);
        return stream::iter(vec![state]).boxed();
      }

      let ticket = jobs.register(&operation.key, operation.cancel.as_ref());
      let token = ticket.token().clone();
      let (tx, rx) = mpsc::unbounded();

      let span = info_span!("operation", namespace = %jobs.namespace(), key = %operation.key);
      tokio::spawn(execute(operation, jobs, ticket, tx).instrument(span));

      // Dropping the stream cancels the job
      let guard = token.clone().drop_guard();
      rx.take_until(token.cancelled_owned())
        .map(move |state| {
          let _alive = &guard;
          state
        })
        .boxed()
    })
    .flatten()
    .boxed()
  }
}

/// Drive one registered job to completion and release its ticket.
async fn execute<C, R, V>(
  operation: Operation<C, R, V>,
  jobs: JobRegistry,
  ticket: JobTicket,
  tx: mpsc::UnboundedSender<LifecycleState<V>>,
) where
  C: Clone + Send + Sync + 'static,
  R: Send + 'static,
  V: Send + 'static,
{
  let token = ticket.token().clone();

  let terminal = tokio::select! {
    biased;
    _ = token.cancelled() => None,
    state = drive(operation, &token, &tx) => state,
  };

  match terminal {
    Some(state) if !token.is_cancelled() => {
      debug!(error = state.is_error(), "Operation finished");
      let _ = tx.unbounded_send(state);
    }
    _ => debug!("Operation cancelled, no terminal state emitted"),
  }

  jobs.finish(&ticket);
}

fn emit<V>(
  tx: &mpsc::UnboundedSender<LifecycleState<V>>,
  token: &CancellationToken,
  state: LifecycleState<V>,
) {
  if !token.is_cancelled() {
    // Receiver gone means nobody is listening any more
    let _ = tx.unbounded_send(state);
  }
}

/// The state machine proper. Returns the terminal state, or `None` when the
/// job was cancelled before it could produce one.
async fn drive<C, R, V>(
  mut operation: Operation<C, R, V>,
  token: &CancellationToken,
  tx: &mpsc::UnboundedSender<LifecycleState<V>>,
) -> Option<LifecycleState<V>>
where
  C: Clone + Send + Sync + 'static,
  R: Send + 'static,
  V: Send + 'static,
{
  let hints = operation.hints;
  let config = operation.config;

  let cached = if config.load_from_cache_first {
    match operation.read_cache() {
      Ok(view) => view,
      Err(err) => return Some(LifecycleState::error(err, hints.error)),
    }
  } else {
    None
  };
  debug!(cached = cached.is_some(), "Loading");
  emit(
    tx,
    token,
    LifecycleState::Loading {
      progress: None,
      cancellable: config.is_network_request,
      cached,
    },
  );

  if !config.is_network_request {
    return Some(finish_from_cache(&operation, hints));
  }

  let Some(create_call) = operation.create_call.take() else {
    return Some(LifecycleState::error(
      MediatorError::NetworkFailure {
        status: TRANSPORT_FAILURE_STATUS,
        message: "No remote call configured".to_string(),
      },
      hints.error,
    ));
  };

  let outcome = create_call().await;
  if token.is_cancelled() {
    debug!("Discarding result of cancelled job");
    return None;
  }
  debug!(status = outcome.status(), "Remote call finished");

  match outcome {
    ApiOutcome::Success { body, .. } => {
      if let Some(write) = &operation.update_local_cache {
        // A superseded job must not overwrite what its successor cached
        if token.is_cancelled() {
          debug!("Job cancelled before cache write, discarding result");
          return None;
        }
        if let Err(err) = write(&body) {
          warn!(error = %err, "Cache write failed");
          return Some(LifecycleState::error(
            MediatorError::cache_write(err),
            hints.error,
          ));
        }
        if token.is_cancelled() {
          return None;
        }
      }

      let completion = std::mem::replace(&mut operation.completion, Completion::ReloadCache);
      match completion {
        Completion::ReloadCache => Some(finish_from_cache(&operation, hints)),
        Completion::FromResponse(map) => {
          let (view, info) = map(body);
          Some(LifecycleState::DataAvailable { view, info })
        }
      }
    }
    ApiOutcome::Empty { status } => Some(LifecycleState::DataAvailable {
      view: None,
      info: Some(Notification::new(
        format!("HTTP {}. Returned nothing.", status),
        hints.info,
      )),
    }),
    ApiOutcome::Failure { status, message } => {
      warn!(status, message = %message, "Remote call failed");
      Some(LifecycleState::error(
        MediatorError::NetworkFailure { status, message },
        hints.error,
      ))
    }
  }
}

fn finish_from_cache<C, R, V>(operation: &Operation<C, R, V>, hints: DisplayHints) -> LifecycleState<V>
where
  C: Clone + Send + Sync + 'static,
  R: Send + 'static,
  V: Send + 'static,
{
  match operation.read_cache() {
    Ok(view) => LifecycleState::DataAvailable { view, info: None },
    Err(err) => LifecycleState::error(err, hints.error),
  }
}

//! A single mediated operation and its builder.
//!
//! An operation bundles the call-time flags with the three functions that
//! specialize the shared orchestration: how to read the cache, how to write
//! a network result into it, and how to start the remote call.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::config::OperationConfig;
use super::error::MediatorError;
use super::outcome::ApiOutcome;
use super::state::{DisplayHint, DisplayHints, Notification};

/// Opens a reactive read of the cached record.
pub type CacheLoader<C> = Box<dyn Fn() -> Result<watch::Receiver<Option<C>>> + Send + Sync>;

/// Builds the view from a cached record.
pub type ViewMapper<C, V> = Box<dyn Fn(C) -> V + Send + Sync>;

/// Writes a successful network body into the cache.
pub type CacheWriter<R> = Box<dyn Fn(&R) -> Result<()> + Send + Sync>;

/// Starts the remote call. Invoked at most once.
pub type CallFactory<R> = Box<dyn FnOnce() -> BoxFuture<'static, ApiOutcome<R>> + Send>;

/// Builds the final view straight from a response body.
pub type ResponseMapper<R, V> = Box<dyn FnOnce(R) -> (Option<V>, Option<Notification>) + Send>;

pub(crate) struct CacheSource<C, V> {
  load: CacheLoader<C>,
  to_view: ViewMapper<C, V>,
}

/// How the final view is produced after a successful call.
pub enum Completion<R, V> {
  /// Re-read the cache once the body has been written into it.
  ReloadCache,
  /// Skip the cache and derive the view from the body.
  FromResponse(ResponseMapper<R, V>),
}

/// One logical request, ready to be handed to
/// [`ResourceMediator::invoke`](super::ResourceMediator::invoke).
pub struct Operation<C, R, V> {
  pub(crate) key: String,
  pub(crate) config: OperationConfig,
  pub(crate) hints: DisplayHints,
  pub(crate) cancel: Option<CancellationToken>,
  pub(crate) cache: Option<CacheSource<C, V>>,
  pub(crate) update_local_cache: Option<CacheWriter<R>>,
  pub(crate) create_call: Option<CallFactory<R>>,
  pub(crate) completion: Completion<R, V>,
}

impl<C, R, V> Operation<C, R, V>
where
  C: Clone + Send + Sync + 'static,
  R: Send + 'static,
  V: Send + 'static,
{
  /// Start building an operation registered under `key`.
  pub fn builder(key: impl Into<String>, config: OperationConfig) -> OperationBuilder<C, R, V> {
    OperationBuilder {
      key: key.into(),
      config,
      hints: DisplayHints::default(),
      cancel: None,
      cache: None,
      update_local_cache: None,
      create_call: None,
      completion: Completion::ReloadCache,
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn config(&self) -> &OperationConfig {
    &self.config
  }

  /// Read the current cached view. An operation without a cache source
  /// reads as empty.
  pub(crate) fn read_cache(&self) -> std::result::Result<Option<V>, MediatorError> {
    let Some(source) = &self.cache else {
      return Ok(None);
    };
    let rx = (source.load)().map_err(MediatorError::cache_read)?;
    let cached = rx.borrow().clone();
    Ok(cached.map(|record| (source.to_view)(record)))
  }
}

/// Builder for [`Operation`].
pub struct OperationBuilder<C, R, V> {
  key: String,
  config: OperationConfig,
  hints: DisplayHints,
  cancel: Option<CancellationToken>,
  cache: Option<CacheSource<C, V>>,
  update_local_cache: Option<CacheWriter<R>>,
  create_call: Option<CallFactory<R>>,
  completion: Completion<R, V>,
}

impl<C, R, V> OperationBuilder<C, R, V>
where
  C: Clone + Send + Sync + 'static,
  R: Send + 'static,
  V: Send + 'static,
{
  /// How to subscribe to the cached record and turn it into a view.
  pub fn load_from_cache<L, M>(mut self, load: L, to_view: M) -> Self
  where
    L: Fn() -> Result<watch::Receiver<Option<C>>> + Send + Sync + 'static,
    M: Fn(C) -> V + Send + Sync + 'static,
  {
    self.cache = Some(CacheSource {
      load: Box::new(load),
      to_view: Box::new(to_view),
    });
    self
  }

  /// How to write a successful body into the cache.
  pub fn update_local_cache<W>(mut self, write: W) -> Self
  where
    W: Fn(&R) -> Result<()> + Send + Sync + 'static,
  {
    self.update_local_cache = Some(Box::new(write));
    self
  }

  /// How to start the remote call.
  pub fn create_call<F, Fut>(mut self, call: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ApiOutcome<R>> + Send + 'static,
  {
    self.create_call = Some(Box::new(move || Box::pin(call())));
    self
  }

  /// Finish from the response body instead of re-reading the cache.
  pub fn finish_from_response<M>(mut self, map: M) -> Self
  where
    M: FnOnce(R) -> (Option<V>, Option<Notification>) + Send + 'static,
  {
    self.completion = Completion::FromResponse(Box::new(map));
    self
  }

  pub fn error_hint(mut self, hint: DisplayHint) -> Self {
    self.hints.error = hint;
    self
  }

  pub fn info_hint(mut self, hint: DisplayHint) -> Self {
    self.hints.info = hint;
    self
  }

  /// Tie the job to a caller-owned token (e.g. a screen's lifetime).
  pub fn cancel_with(mut self, token: &CancellationToken) -> Self {
    self.cancel = Some(token.clone());
    self
  }

  pub fn build(self) -> Result<Operation<C, R, V>> {
    if self.config.is_network_request && self.create_call.is_none() {
      return Err(eyre!(
        "Operation '{}' is a network request but has no remote call",
        self.key
      ));
    }

    Ok(Operation {
      key: self.key,
      config: self.config,
      hints: self.hints,
      cancel: self.cancel,
      cache: self.cache,
      update_local_cache: self.update_local_cache,
      create_call: self.create_call,
      completion: self.completion,
    })
  }
}

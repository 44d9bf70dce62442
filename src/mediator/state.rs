//! Lifecycle states emitted to observers of a mediated operation.

use super::error::MediatorError;

/// How a notification should be presented to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayHint {
  /// Rendered next to the content it refers to
  Inline,
  /// Short-lived, non-blocking message
  #[default]
  Toast,
  /// Blocking message the user must dismiss
  Dialog,
}

/// A human-readable message plus a display hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub message: String,
  pub hint: DisplayHint,
}

impl Notification {
  pub fn new(message: impl Into<String>, hint: DisplayHint) -> Self {
    Self {
      message: message.into(),
      hint,
    }
  }
}

/// Hints chosen per operation for the notifications it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayHints {
  pub error: DisplayHint,
  pub info: DisplayHint,
}

impl Default for DisplayHints {
  fn default() -> Self {
    Self {
      error: DisplayHint::Dialog,
      info: DisplayHint::Toast,
    }
  }
}

/// The state of a mediated operation as seen by its subscriber.
///
/// An invocation emits at most one `Loading` followed by exactly one
/// terminal state (`DataAvailable` or `ErrorOccurred`), unless it is
/// cancelled, in which case the sequence simply ends.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleState<V> {
  /// Work is in progress. `cached` holds the view read from the cache
  /// before any network activity, when the operation asked for it.
  Loading {
    progress: Option<u8>,
    cancellable: bool,
    cached: Option<V>,
  },
  /// The operation finished with a (possibly empty) view.
  DataAvailable {
    view: Option<V>,
    info: Option<Notification>,
  },
  /// The operation failed.
  ErrorOccurred {
    error: MediatorError,
    notification: Notification,
  },
}

impl<V> LifecycleState<V> {
  pub(crate) fn error(error: MediatorError, hint: DisplayHint) -> Self {
    let notification = Notification::new(error.to_string(), hint);
    LifecycleState::ErrorOccurred {
      error,
      notification,
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, LifecycleState::Loading { .. })
  }

  pub fn is_terminal(&self) -> bool {
    !self.is_loading()
  }

  pub fn is_error(&self) -> bool {
    matches!(self, LifecycleState::ErrorOccurred { .. })
  }

  /// The view carried by this state, cached or final.
  pub fn view(&self) -> Option<&V> {
    match self {
      LifecycleState::Loading { cached, .. } => cached.as_ref(),
      LifecycleState::DataAvailable { view, .. } => view.as_ref(),
      LifecycleState::ErrorOccurred { .. } => None,
    }
  }

  /// The notification to show, if any.
  pub fn notification(&self) -> Option<&Notification> {
    match self {
      LifecycleState::Loading { .. } => None,
      LifecycleState::DataAvailable { info, .. } => info.as_ref(),
      LifecycleState::ErrorOccurred { notification, .. } => Some(notification),
    }
  }

  pub fn error_kind(&self) -> Option<&MediatorError> {
    match self {
      LifecycleState::ErrorOccurred { error, .. } => Some(error),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_state_carries_message_and_hint() {
    let state: LifecycleState<()> =
      LifecycleState::error(MediatorError::OfflineAbort, DisplayHint::Inline);

    assert!(state.is_error());
    assert!(state.is_terminal());
    let notification = state.notification().unwrap();
    assert_eq!(notification.message, "no internet, cannot proceed");
    assert_eq!(notification.hint, DisplayHint::Inline);
    assert_eq!(state.error_kind(), Some(&MediatorError::OfflineAbort));
  }

  #[test]
  fn test_view_accessor() {
    let loading = LifecycleState::Loading {
      progress: None,
      cancellable: true,
      cached: Some(7),
    };
    assert!(loading.is_loading());
    assert_eq!(loading.view(), Some(&7));
    assert!(loading.notification().is_none());

    let done = LifecycleState::DataAvailable {
      view: None::<i32>,
      info: Some(Notification::new("ok", DisplayHint::Toast)),
    };
    assert!(done.is_terminal());
    assert_eq!(done.view(), None);
    assert_eq!(done.notification().unwrap().message, "ok");
  }

  #[test]
  fn test_default_hints() {
    let hints = DisplayHints::default();
    assert_eq!(hints.error, DisplayHint::Dialog);
    assert_eq!(hints.info, DisplayHint::Toast);
  }
}

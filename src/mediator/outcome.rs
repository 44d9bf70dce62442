//! Terminal result of a single remote call.

/// Status reported for failures that never produced an HTTP response
/// (timeouts, refused connections, DNS errors).
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Outcome of one network attempt. Exactly one is produced per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome<T> {
  /// 2xx with a decoded body
  Success { body: T, status: u16 },
  /// 2xx without a body
  Empty { status: u16 },
  /// HTTP error, undecodable body, or transport fault
  Failure { status: u16, message: String },
}

impl<T> ApiOutcome<T> {
  pub fn transport_failure(message: impl Into<String>) -> Self {
    ApiOutcome::Failure {
      status: TRANSPORT_FAILURE_STATUS,
      message: message.into(),
    }
  }

  pub fn status(&self) -> u16 {
    match self {
      ApiOutcome::Success { status, .. }
      | ApiOutcome::Empty { status }
      | ApiOutcome::Failure { status, .. } => *status,
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, ApiOutcome::Success { .. })
  }

  /// Transform the body, keeping the status.
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
    match self {
      ApiOutcome::Success { body, status } => ApiOutcome::Success {
        body: f(body),
        status,
      },
      ApiOutcome::Empty { status } => ApiOutcome::Empty { status },
      ApiOutcome::Failure { status, message } => ApiOutcome::Failure { status, message },
    }
  }
}

//! Failure kinds that terminate a mediated operation.

use thiserror::Error;

/// Message shown when an operation refuses to run without connectivity.
pub const OFFLINE_ABORT_MESSAGE: &str = "no internet, cannot proceed";

/// Every way an invocation can end in `ErrorOccurred`.
///
/// The `Display` output is the user-facing message carried by the
/// notification. Cancellation is not represented here: a cancelled or
/// superseded job ends silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediatorError {
  /// Pre-flight abort; neither the cache nor the network was touched.
  #[error("{}", OFFLINE_ABORT_MESSAGE)]
  OfflineAbort,

  /// The remote call failed, either with an HTTP error or a transport fault.
  #[error("{message}")]
  NetworkFailure { status: u16, message: String },

  /// The cache rejected an upsert of the network result.
  #[error("Failed to update the local cache: {cause}")]
  CacheWriteFailure { cause: String },

  /// The cache could not be read.
  #[error("Failed to read the local cache: {cause}")]
  CacheReadFailure { cause: String },
}

impl MediatorError {
  pub(crate) fn cache_write(err: color_eyre::Report) -> Self {
    MediatorError::CacheWriteFailure {
      cause: err.to_string(),
    }
  }

  pub(crate) fn cache_read(err: color_eyre::Report) -> Self {
    MediatorError::CacheReadFailure {
      cause: err.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;

  #[test]
  fn test_offline_abort_message() {
    assert_eq!(
      MediatorError::OfflineAbort.to_string(),
      "no internet, cannot proceed"
    );
  }

  #[test]
  fn test_network_failure_shows_server_message() {
    let err = MediatorError::NetworkFailure {
      status: 400,
      message: "Invalid credentials".to_string(),
    };
    assert_eq!(err.to_string(), "Invalid credentials");
  }

  #[test]
  fn test_cache_errors_keep_cause() {
    let err = MediatorError::cache_write(eyre!("disk full"));
    assert_eq!(
      err,
      MediatorError::CacheWriteFailure {
        cause: "disk full".to_string()
      }
    );

    let err = MediatorError::cache_read(eyre!("Lock poisoned"));
    assert!(err.to_string().contains("Lock poisoned"));
  }
}

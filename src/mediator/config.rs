//! Per-invocation operation flags.

/// Flags fixed at call time that decide which path an invocation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationConfig {
  /// Connectivity snapshot taken when the operation was created
  pub network_available: bool,
  /// Whether the operation contacts the network at all
  pub is_network_request: bool,
  /// Abort before any I/O when the network is required but unavailable
  pub cancel_if_offline: bool,
  /// Emit the cached view before any network activity
  pub load_from_cache_first: bool,
}

impl OperationConfig {
  /// A network operation. Callers opt into offline abort and cache
  /// pre-emission with the builder methods.
  pub fn network(network_available: bool) -> Self {
    Self {
      network_available,
      is_network_request: true,
      cancel_if_offline: false,
      load_from_cache_first: false,
    }
  }

  /// An operation served from the cache alone.
  pub fn cache_only(network_available: bool) -> Self {
    Self {
      network_available,
      is_network_request: false,
      cancel_if_offline: false,
      load_from_cache_first: false,
    }
  }

  pub fn cancel_if_offline(mut self, cancel: bool) -> Self {
    self.cancel_if_offline = cancel;
    self
  }

  pub fn load_from_cache_first(mut self, load: bool) -> Self {
    self.load_from_cache_first = load;
    self
  }

  /// True when the invocation must end with an offline abort before
  /// touching the cache or the network.
  pub fn aborts_offline(&self) -> bool {
    self.is_network_request && self.cancel_if_offline && !self.network_available
  }
}

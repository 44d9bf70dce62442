//! Network reachability, answered at call time.
//!
//! The repositories ask once per invocation and bake the answer into the
//! operation's config. Nothing here observes connectivity continuously.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

#[async_trait]
pub trait ConnectivityOracle: Send + Sync {
  async fn is_connected(&self) -> bool;
}

/// Probes reachability by opening a TCP connection to the API host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
  host: String,
  port: u16,
  timeout: Duration,
}

impl TcpProbe {
  pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
    Self {
      host: host.into(),
      port,
      timeout,
    }
  }

  /// Probe the host and port (or scheme default port) of `url`.
  pub fn for_url(url: &Url, timeout: Duration) -> Result<Self> {
    let host = url
      .host_str()
      .ok_or_else(|| eyre!("API url has no host: {}", url))?;
    let port = url
      .port_or_known_default()
      .ok_or_else(|| eyre!("API url has no port: {}", url))?;
    Ok(Self::new(host, port, timeout))
  }
}

#[async_trait]
impl ConnectivityOracle for TcpProbe {
  async fn is_connected(&self) -> bool {
    let target = (self.host.as_str(), self.port);
    let connected = matches!(
      tokio::time::timeout(self.timeout, TcpStream::connect(target)).await,
      Ok(Ok(_))
    );
    debug!(host = %self.host, port = self.port, connected, "Connectivity probe");
    connected
  }
}

/// Fixed answer, flipped by hand. Backs `--offline` and tests.
#[derive(Debug)]
pub struct ManualConnectivity {
  online: AtomicBool,
}

impl ManualConnectivity {
  pub fn new(online: bool) -> Self {
    Self {
      online: AtomicBool::new(online),
    }
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }
}

#[async_trait]
impl ConnectivityOracle for ManualConnectivity {
  async fn is_connected(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }
}

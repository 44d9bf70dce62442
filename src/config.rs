use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{AuthToken, BLOG_ORDER_DESC, ORDER_BY_DATE_UPDATED};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub blog: BlogConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL, endpoint paths are joined onto it
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Request timeout for every API call
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Connect timeout for the reachability probe
  #[serde(default = "default_probe_timeout_ms")]
  pub probe_timeout_ms: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
      probe_timeout_ms: default_probe_timeout_ms(),
    }
  }
}

fn default_api_url() -> String {
  "https://open-api.xyz/api/".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_probe_timeout_ms() -> u64 {
  1500
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// SQLite file (defaults to the platform data dir)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlogConfig {
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  /// Sort field, `date_updated` or `username`
  #[serde(default = "default_filter")]
  pub default_filter: String,
  /// `-` for descending, empty for ascending
  #[serde(default = "default_order")]
  pub default_order: String,
}

impl Default for BlogConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      default_filter: default_filter(),
      default_order: default_order(),
    }
  }
}

fn default_page_size() -> usize {
  10
}

fn default_filter() -> String {
  ORDER_BY_DATE_UPDATED.to_string()
}

fn default_order() -> String {
  BLOG_ORDER_DESC.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
  /// Log directory (defaults to the platform data dir)
  pub dir: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./openblog.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/openblog/config.yaml
  ///
  /// Every field has a default, so running without any file is fine.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("openblog.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("openblog").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Cache database location, falling back to the data dir.
  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.cache.path {
      Some(path) => Ok(path.clone()),
      None => crate::cache::SqliteStorage::default_path(),
    }
  }

  /// Log directory, falling back to the data dir.
  pub fn log_dir(&self) -> Result<PathBuf> {
    match &self.logging.dir {
      Some(dir) => Ok(dir.clone()),
      None => dirs::data_dir()
        .map(|d| d.join("openblog").join("logs"))
        .ok_or_else(|| eyre!("Could not determine data directory")),
    }
  }

  /// Get the credential from environment variables.
  ///
  /// Checks OPENBLOG_TOKEN first, then OPENAPI_TOKEN as fallback. The
  /// account is read from OPENBLOG_ACCOUNT_PK.
  pub fn get_auth_token() -> Result<AuthToken> {
    auth_token_from(|name| std::env::var(name).ok())
  }
}

fn auth_token_from(lookup: impl Fn(&str) -> Option<String>) -> Result<AuthToken> {
  let token = lookup("OPENBLOG_TOKEN")
    .or_else(|| lookup("OPENAPI_TOKEN"))
    .ok_or_else(|| {
      eyre!("API token not found. Set OPENBLOG_TOKEN or OPENAPI_TOKEN environment variable.")
    })?;

  let account_pk = lookup("OPENBLOG_ACCOUNT_PK")
    .ok_or_else(|| eyre!("Account not found. Set OPENBLOG_ACCOUNT_PK environment variable."))?;
  let account_pk = account_pk
    .trim()
    .parse::<i64>()
    .map_err(|e| eyre!("Invalid OPENBLOG_ACCOUNT_PK '{}': {}", account_pk, e))?;

  Ok(AuthToken { account_pk, token })
}

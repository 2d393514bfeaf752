use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_TTL_SECS;
use crate::queue::DEFAULT_RETENTION_HOURS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub queue: QueueConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Root that relative endpoints are joined onto
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before a cached response is reported stale
  #[serde(default = "default_ttl_secs")]
  pub default_ttl_secs: i64,
}

impl CacheConfig {
  /// The configured TTL, rejecting negative or out-of-range values.
  pub fn default_ttl(&self) -> Result<Duration> {
    if self.default_ttl_secs < 0 {
      return Err(eyre!(
        "cache.default_ttl_secs must not be negative: {}",
        self.default_ttl_secs
      ));
    }
    Duration::try_seconds(self.default_ttl_secs)
      .ok_or_else(|| eyre!("cache.default_ttl_secs is out of range: {}", self.default_ttl_secs))
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_secs: DEFAULT_TTL_SECS,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
  /// Hours a failed offline request is retried before being dropped
  #[serde(default = "default_retention_hours")]
  pub retention_hours: i64,
}

impl QueueConfig {
  /// The configured retention window, rejecting negative or out-of-range values.
  pub fn retention(&self) -> Result<Duration> {
    if self.retention_hours < 0 {
      return Err(eyre!(
        "queue.retention_hours must not be negative: {}",
        self.retention_hours
      ));
    }
    Duration::try_hours(self.retention_hours)
      .ok_or_else(|| eyre!("queue.retention_hours is out of range: {}", self.retention_hours))
  }
}

impl Default for QueueConfig {
  fn default() -> Self {
    Self {
      retention_hours: DEFAULT_RETENTION_HOURS,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file (default: $XDG_DATA_HOME/schoolsync/store.db)
  pub path: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_ttl_secs() -> i64 {
  DEFAULT_TTL_SECS
}

fn default_retention_hours() -> i64 {
  DEFAULT_RETENTION_HOURS
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./schoolsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/schoolsync/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/schoolsync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("schoolsync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("schoolsync").join("config.yaml");
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
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    config.cache.default_ttl()?;
    config.queue.retention()?;
    Ok(config)
  }

  /// Get the API bearer token from the environment, if one is set.
  pub fn get_api_token() -> Option<String> {
    std::env::var("SCHOOLSYNC_API_TOKEN")
      .ok()
      .filter(|t| !t.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  base_url: https://school.example/api\n").unwrap();
    assert_eq!(config.api.base_url, "https://school.example/api");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.cache.default_ttl_secs, 300);
    assert_eq!(config.queue.retention_hours, 24);
    assert!(config.storage.path.is_none());
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  base_url: http://localhost:5000/api
  timeout_secs: 5
cache:
  default_ttl_secs: 60
queue:
  retention_hours: 48
storage:
  path: /tmp/schoolsync.db
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.cache.default_ttl_secs, 60);
    assert_eq!(config.queue.retention_hours, 48);
    assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/schoolsync.db")));
  }

  #[test]
  fn test_negative_durations_are_rejected() {
    let base = "api:\n  base_url: https://x.example\n";
    assert!(Config::parse(&format!("{base}cache:\n  default_ttl_secs: -1\n")).is_err());
    assert!(Config::parse(&format!("{base}queue:\n  retention_hours: -24\n")).is_err());
  }

  #[test]
  fn test_huge_durations_are_rejected() {
    let base = "api:\n  base_url: https://x.example\n";
    let ttl = format!("{base}cache:\n  default_ttl_secs: {}\n", i64::MAX);
    let retention = format!("{base}queue:\n  retention_hours: {}\n", i64::MAX);
    assert!(Config::parse(&ttl).is_err());
    assert!(Config::parse(&retention).is_err());
  }

  #[test]
  fn test_duration_accessors() {
    let config = Config::parse("api:\n  base_url: https://x.example\n").unwrap();
    assert_eq!(config.cache.default_ttl().unwrap(), Duration::minutes(5));
    assert_eq!(config.queue.retention().unwrap(), Duration::hours(24));
  }

  #[test]
  fn test_missing_api_section_is_an_error() {
    assert!(Config::parse("cache:\n  default_ttl_secs: 1\n").is_err());
  }

  #[test]
  fn test_load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "api:\n  base_url: https://x.example\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.api.base_url, "https://x.example");

    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
  }
}

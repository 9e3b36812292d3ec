use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::RetryPolicy;
use crate::trainer::session::read_token_file;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the trainer API, e.g. https://api.example.com/v1
  pub base_url: String,
  /// API key; prefer the FITDESK_API_KEY environment variable
  pub api_key: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  /// Retries after the first attempt, for network failures only
  pub attempts: u32,
  pub delay_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    let policy = RetryPolicy::default();
    Self {
      attempts: policy.retries,
      delay_ms: policy.delay.as_millis() as u64,
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy {
      retries: self.attempts,
      delay: Duration::from_millis(self.delay_ms),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  pub ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: crate::cache::DEFAULT_TTL.as_secs(),
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
  /// File holding the current access token, rewritten by the sign-in flow.
  /// Defaults to $XDG_CONFIG_HOME/fitdesk/token.
  pub token_file: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fitdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fitdesk/config.yaml
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
        "No configuration file found. Create one at ~/.config/fitdesk/config.yaml\n\
                 with at least `api: {{ base_url: ... }}`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fitdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fitdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to load config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML document.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Invalid configuration: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    let url = url::Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url '{}': {}", self.api.base_url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!("api.base_url must be http or https, got {}", url.scheme()));
    }
    Ok(())
  }

  /// Get the API key.
  ///
  /// Checks FITDESK_API_KEY, then TRAINER_API_KEY, then `api.api_key`.
  pub fn api_key(&self) -> Result<String> {
    std::env::var("FITDESK_API_KEY")
      .or_else(|_| std::env::var("TRAINER_API_KEY"))
      .ok()
      .or_else(|| self.api.api_key.clone())
      .ok_or_else(|| {
        eyre!("API key not found. Set FITDESK_API_KEY or api.api_key in the config file.")
      })
  }

  /// Token file location, explicit or default.
  pub fn token_file(&self) -> Option<PathBuf> {
    self
      .auth
      .token_file
      .clone()
      .or_else(|| dirs::config_dir().map(|dir| dir.join("fitdesk").join("token")))
  }

  /// Initial bearer token: FITDESK_TOKEN, else the token file.
  pub fn initial_token(&self) -> Option<String> {
    std::env::var("FITDESK_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
      .or_else(|| self.token_file().as_deref().and_then(read_token_file))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("api:\n  base_url: https://api.example.com/v1\n").unwrap();

    assert_eq!(config.api.timeout(), Duration::from_secs(30));
    assert_eq!(config.retry.policy(), RetryPolicy::default());
    assert!(config.cache.enabled);
    assert_eq!(config.cache.ttl(), Duration::from_secs(300));
    assert!(config.auth.token_file.is_none());
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  base_url: http://localhost:8080
  api_key: from-file
  timeout_secs: 5
retry:
  attempts: 1
  delay_ms: 250
cache:
  enabled: false
auth:
  token_file: /tmp/fitdesk-token
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.api.api_key.as_deref(), Some("from-file"));
    assert_eq!(
      config.retry.policy(),
      RetryPolicy {
        retries: 1,
        delay: Duration::from_millis(250),
      }
    );
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.ttl_secs, 300);
    assert_eq!(config.token_file(), Some(PathBuf::from("/tmp/fitdesk-token")));
  }

  #[test]
  fn test_invalid_base_url() {
    assert!(Config::from_yaml("api:\n  base_url: not a url\n").is_err());
    assert!(Config::from_yaml("api:\n  base_url: ftp://files.example.com\n").is_err());
    assert!(Config::from_yaml("retry:\n  attempts: 2\n").is_err());
  }
}

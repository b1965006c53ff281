//! Client tuning knobs and the on-disk configuration file.
//!
//! [`ClientConfig`] holds everything the transport core consumes besides
//! credentials: timeouts, retry policy, and the proactive rate-limit wait
//! cap. Builder methods cover the common settings.
//!
//! [`ConfigFile`] is the TOML file the CLI writes with `ainative config set`.
//! It is one of the credential sources (see [`crate::auth`]) and can also
//! carry timeout / retry overrides.
//!
//! ```ignore
//! let config = ClientConfig::default()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_max_attempts(5)
//!     .with_max_rate_limit_wait(Duration::from_secs(5));
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::retry::RetryConfig;
use crate::auth::CredentialFragment;
use crate::error::{ConfigProblem, Error, Result};

/// Environment variable that overrides the config file location.
pub const ENV_CONFIG_PATH: &str = "AINATIVE_CONFIG";

/// Transport-level configuration for a client instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-attempt timeout (connect + read). Default: 30 s.
    pub timeout: Duration,
    /// Connection establishment timeout. Default: 10 s.
    pub connect_timeout: Duration,
    /// Retry and backoff policy.
    pub retry: RetryConfig,
    /// Upper bound on the proactive wait when quota is exhausted. Default: 30 s.
    /// Zero disables proactive throttling.
    pub max_rate_limit_wait: Duration,
    /// Idle connections kept per host in the pool. Default: 16.
    pub pool_max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            max_rate_limit_wait: Duration::from_secs(30),
            pool_max_idle_per_host: 16,
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Total attempts per operation, including the first one.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.max_rate_limit_wait = wait;
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, idle: usize) -> Self {
        self.pool_max_idle_per_host = idle;
        self
    }

    /// Apply the optional overrides carried by a config file.
    pub fn apply_file(mut self, file: &ConfigFile) -> Self {
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = file.max_attempts {
            self.retry.max_attempts = attempts.max(1);
        }
        self
    }
}

/// Keys accepted by [`ConfigFile::set`].
pub const CONFIG_KEYS: &[&str] = &[
    "api_key",
    "api_secret",
    "organization_id",
    "base_url",
    "timeout_secs",
    "max_attempts",
];

/// Persisted local configuration (`~/.ainative/config.toml`).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl ConfigFile {
    /// `$AINATIVE_CONFIG`, else `$HOME/.ainative/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(ENV_CONFIG_PATH).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(|home| PathBuf::from(home).join(".ainative").join("config.toml"))
    }

    /// Load from the default location. No location or no file yields an
    /// empty config.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::configuration(
                    ConfigProblem::ConfigFile,
                    format!("failed to read {}: {e}", path.display()),
                ));
            }
        };
        toml::from_str(&content).map_err(|e| {
            Error::configuration(
                ConfigProblem::ConfigFile,
                format!("failed to parse {}: {e}", path.display()),
            )
        })
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |e: std::io::Error| {
            Error::configuration(
                ConfigProblem::ConfigFile,
                format!("failed to write {}: {e}", path.display()),
            )
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            Error::configuration(ConfigProblem::ConfigFile, format!("failed to encode: {e}"))
        })?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Set one key by name. Unknown keys and unparsable numbers are
    /// validation errors.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match key {
            "api_key" => self.api_key = Some(value),
            "api_secret" => self.api_secret = Some(value),
            "organization_id" => self.organization_id = Some(value),
            "base_url" => {
                crate::auth::normalize_base_url(&value)?;
                self.base_url = Some(value);
            }
            "timeout_secs" => self.timeout_secs = Some(parse_number(key, &value)?),
            "max_attempts" => self.max_attempts = Some(parse_number(key, &value)?),
            _ => {
                return Err(Error::validation(format!(
                    "unknown configuration key '{key}' (expected one of: {})",
                    CONFIG_KEYS.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Remove one key by name.
    pub fn unset(&mut self, key: &str) -> Result<()> {
        match key {
            "api_key" => self.api_key = None,
            "api_secret" => self.api_secret = None,
            "organization_id" => self.organization_id = None,
            "base_url" => self.base_url = None,
            "timeout_secs" => self.timeout_secs = None,
            "max_attempts" => self.max_attempts = None,
            _ => {
                return Err(Error::validation(format!(
                    "unknown configuration key '{key}'"
                )));
            }
        }
        Ok(())
    }

    /// The credential fields of this file, as a resolution fragment.
    pub fn fragment(&self) -> CredentialFragment {
        CredentialFragment {
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.clone(),
            organization_id: self.organization_id.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::validation(format!("'{key}' must be a non-negative integer")))
}

impl fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigFile")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("organization_id", &self.organization_id)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

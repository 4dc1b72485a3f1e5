//! Client configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/chunkup/config.toml`
//! - Windows: `%APPDATA%/chunkup/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use chunkup_transfer::{BackoffConfig, DEFAULT_CHUNK_SIZE, RetryPolicy};
use chunkup_uploader::UploaderConfig;
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service root, without the `/api` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: String,

    /// Bytes per uploaded chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Retryable failures tolerated per chunk phase.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// First retry delay in milliseconds (0 = retry immediately).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Only upload images and PDF files.
    #[serde(default = "default_restrict_file_types")]
    pub restrict_file_types: bool,

    /// Where downloads land unless `--out` is given.
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_retry_budget() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_restrict_file_types() -> bool {
    true
}

fn default_download_dir() -> String {
    ".".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            chunk_size: default_chunk_size(),
            retry_budget: default_retry_budget(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            restrict_file_types: default_restrict_file_types(),
            download_dir: default_download_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the default location), creating
    /// a default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to `path`, owner-readable only on Unix.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds the access token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Uploader settings derived from this configuration.
    pub fn uploader_config(&self) -> UploaderConfig {
        let backoff = (self.retry_backoff_ms > 0).then(|| BackoffConfig {
            initial_delay: Duration::from_millis(self.retry_backoff_ms),
            ..BackoffConfig::default()
        });
        UploaderConfig {
            chunk_size: self.chunk_size,
            retry: RetryPolicy {
                budget: self.retry_budget,
                backoff,
            },
            restrict_file_types: self.restrict_file_types,
            ..UploaderConfig::default()
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("chunkup")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("chunkup").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/chunkup/config.toml"))
    }
}

//! Pool configuration (`~/.config/credpool/config.toml`).
//!
//! Every field has a default, so a missing file or a partial file is fine:
//! - `[rate_limit]`: sliding window length and per-window request cap
//! - `[format]`: admission rules for new credentials
//! - `[storage]`: state directory override and at-rest obfuscation toggle

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Provider-imposed free-tier limit: 15 requests per minute per key.
const DEFAULT_WINDOW_SECS: u64 = 60;
const DEFAULT_MAX_REQUESTS: u32 = 15;
const DEFAULT_MIN_LENGTH: usize = 20;
const DEFAULT_REQUIRED_PREFIX: &str = "AIza";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Expected provider prefix. An empty string disables the prefix check.
    #[serde(default = "default_required_prefix")]
    pub required_prefix: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            required_prefix: DEFAULT_REQUIRED_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the state directory. None = XDG state dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Seal the pool record with the embedded application key.
    #[serde(default = "default_encrypt")]
    pub encrypt: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            encrypt: true,
        }
    }
}

fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECS
}

fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

fn default_min_length() -> usize {
    DEFAULT_MIN_LENGTH
}

fn default_required_prefix() -> String {
    DEFAULT_REQUIRED_PREFIX.to_string()
}

fn default_encrypt() -> bool {
    true
}

impl PoolConfig {
    /// Load from `~/.config/credpool/config.toml`.
    ///
    /// Returns `Default` if the file does not exist or the config
    /// directory cannot be determined (e.g., no HOME in containers).
    pub fn load() -> Result<Self> {
        match paths::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolved state directory: explicit override, else the XDG default.
    pub fn state_dir(&self) -> PathBuf {
        self.storage.dir.clone().unwrap_or_else(paths::state_dir)
    }

    /// Generate default config TOML with comments as a template.
    pub fn default_template() -> String {
        r#"# credpool configuration
# Location: ~/.config/credpool/config.toml

[rate_limit]
window_secs = 60    # Sliding window length
max_requests = 15   # Requests allowed per key per window

[format]
min_length = 20
required_prefix = "AIza"   # Empty string disables the prefix check

[storage]
encrypt = true      # Obfuscate the pool at rest (not a security boundary)
# dir = "/path/to/state"
"#
        .to_string()
    }

    /// Write the commented template to `path`, creating parent directories.
    pub fn save_default_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, Self::default_template())
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }
}

//! Configuration loading and validation (`~/.config/credpool/config.toml`).

pub mod config;
pub mod paths;
pub mod validate;

pub use config::{FormatConfig, PoolConfig, RateLimitConfig, StorageConfig};
pub use validate::validate_config;

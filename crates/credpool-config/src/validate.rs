use anyhow::{Result, bail};

use crate::config::PoolConfig;

/// Validate a loaded configuration.
/// Returns Ok(()) if valid, or Err with a descriptive message.
pub fn validate_config(config: &PoolConfig) -> Result<()> {
    validate_rate_limit(config)?;
    validate_format(config)?;
    Ok(())
}

fn validate_rate_limit(config: &PoolConfig) -> Result<()> {
    if config.rate_limit.window_secs == 0 {
        bail!("rate_limit.window_secs must be > 0 (got 0)");
    }
    if config.rate_limit.max_requests == 0 {
        bail!("rate_limit.max_requests must be > 0 (got 0)");
    }
    Ok(())
}

fn validate_format(config: &PoolConfig) -> Result<()> {
    if config.format.min_length == 0 {
        bail!("format.min_length must be > 0 (got 0)");
    }
    if config.format.required_prefix.len() > config.format.min_length {
        bail!(
            "format.required_prefix ({} chars) is longer than format.min_length ({})",
            config.format.required_prefix.len(),
            config.format.min_length
        );
    }
    Ok(())
}

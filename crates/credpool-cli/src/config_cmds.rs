use anyhow::{Context, Result, bail};
use serde_json::json;
use std::path::Path;

use credpool_config::PoolConfig;
use credpool_core::types::OutputFormat;

pub(crate) fn handle_config_show(
    config: &PoolConfig,
    state_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = json!({
                "rate_limit": {
                    "window_secs": config.rate_limit.window_secs,
                    "max_requests": config.rate_limit.max_requests,
                },
                "format": {
                    "min_length": config.format.min_length,
                    "required_prefix": config.format.required_prefix,
                },
                "storage": {
                    "encrypt": config.storage.encrypt,
                    "dir": state_dir.display().to_string(),
                },
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to render configuration")?;
            print!("{rendered}");
            println!("# state dir: {}", state_dir.display());
        }
    }
    Ok(())
}

pub(crate) fn handle_config_init(path: Option<&Path>, force: bool) -> Result<()> {
    let Some(path) = path else {
        bail!("Cannot determine config directory; pass --config <PATH>");
    };
    if path.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    PoolConfig::save_default_template(path)?;
    eprintln!("Wrote default config to {}", path.display());
    Ok(())
}

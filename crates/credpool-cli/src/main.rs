use anyhow::{Context, Result};
use clap::Parser;

mod cli;
mod config_cmds;
mod pool_cmds;

use cli::{Cli, Commands, ConfigCommands};
use credpool_config::PoolConfig;
use credpool_scheduler::CredentialService;

fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let format = cli.format;

    let config_path = match cli.config.clone() {
        Some(path) => Some(path),
        None => credpool_config::paths::config_path(),
    };
    let config = match &config_path {
        Some(path) => PoolConfig::load_from(path)?,
        None => PoolConfig::default(),
    };
    credpool_config::validate_config(&config).context("Invalid configuration")?;

    let state_dir = cli.state_dir.clone().unwrap_or_else(|| config.state_dir());
    tracing::debug!(state_dir = %state_dir.display(), "Opening credential pool");

    if let Commands::Classify { message } = &cli.command {
        return pool_cmds::handle_classify(message, format);
    }

    if let Commands::Config { cmd } = &cli.command {
        match cmd {
            ConfigCommands::Show => config_cmds::handle_config_show(&config, &state_dir, format)?,
            ConfigCommands::Init { force } => {
                config_cmds::handle_config_init(config_path.as_deref(), *force)?
            }
        }
        return Ok(());
    }

    let service = CredentialService::open(&state_dir, &config);
    let exit_code = match cli.command {
        Commands::Add { key } => pool_cmds::handle_add(&service, &key, format)?,
        Commands::Remove { key } => pool_cmds::handle_remove(&service, &key, format)?,
        Commands::List { reveal } => pool_cmds::handle_list(&service, reveal, format)?,
        Commands::Next { record } => pool_cmds::handle_next(&service, record, format)?,
        Commands::Record { key } => pool_cmds::handle_record(&service, &key, format)?,
        Commands::Status => pool_cmds::handle_status(&service, format)?,
        Commands::Validate { key } => pool_cmds::handle_validate(&service, &key, format)?,
        Commands::Clear => pool_cmds::handle_clear(&service, format)?,
        Commands::Config { .. } | Commands::Classify { .. } => 0,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

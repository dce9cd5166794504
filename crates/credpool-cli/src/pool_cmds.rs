//! Pool subcommands. Each handler returns the process exit code.

use anyhow::{Result, bail};
use serde_json::json;

use credpool_core::types::OutputFormat;
use credpool_core::{AddOutcome, RemoveOutcome};
use credpool_scheduler::{CredentialService, classify_failure, mask};

/// No credential is currently usable (empty pool or all throttled).
pub(crate) const EXIT_UNAVAILABLE: i32 = 2;
pub(crate) const EXIT_REJECTED: i32 = 1;

pub(crate) fn handle_add(
    service: &CredentialService,
    key: &str,
    format: OutputFormat,
) -> Result<i32> {
    let outcome = service.add_credential(key);
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string(&outcome)?);
    }

    match outcome {
        AddOutcome::Added { index } => {
            if let OutputFormat::Text = format {
                println!("Added {} at position {}", mask(key.trim()), index);
            }
            Ok(0)
        }
        AddOutcome::AlreadyPresent => {
            if let OutputFormat::Text = format {
                println!("{} is already in the pool", mask(key.trim()));
            }
            Ok(0)
        }
        AddOutcome::Rejected(rejection) => {
            if let OutputFormat::Text = format {
                eprintln!("Rejected: {rejection}");
            }
            Ok(EXIT_REJECTED)
        }
        AddOutcome::StorageFailed => bail!("Failed to save credential pool"),
    }
}

pub(crate) fn handle_remove(
    service: &CredentialService,
    key: &str,
    format: OutputFormat,
) -> Result<i32> {
    let outcome = service.remove_credential(key);
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string(&outcome)?);
    }

    match outcome {
        RemoveOutcome::Removed { remaining, .. } => {
            if let OutputFormat::Text = format {
                println!("Removed {} ({} remaining)", mask(key), remaining);
            }
            Ok(0)
        }
        RemoveOutcome::NotFound => {
            if let OutputFormat::Text = format {
                eprintln!("{} is not in the pool", mask(key));
            }
            Ok(EXIT_REJECTED)
        }
        RemoveOutcome::StorageFailed => bail!("Failed to save credential pool"),
    }
}

pub(crate) fn handle_list(
    service: &CredentialService,
    reveal: bool,
    format: OutputFormat,
) -> Result<i32> {
    let shown: Vec<String> = service
        .list_credentials()
        .iter()
        .map(|credential| {
            if reveal {
                credential.clone()
            } else {
                mask(credential)
            }
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&shown)?),
        OutputFormat::Text => {
            if shown.is_empty() {
                eprintln!("No credentials configured. Add one with `credpool add <KEY>`.");
            }
            for (index, credential) in shown.iter().enumerate() {
                println!("{index}\t{credential}");
            }
        }
    }
    Ok(0)
}

pub(crate) fn handle_next(
    service: &CredentialService,
    record: bool,
    format: OutputFormat,
) -> Result<i32> {
    let Some(selection) = service.select() else {
        match format {
            OutputFormat::Json => println!("{}", json!({ "credential": null })),
            OutputFormat::Text => {
                if service.list_credentials().is_empty() {
                    eprintln!("No credentials configured. Add one with `credpool add <KEY>`.");
                } else {
                    eprintln!("All credentials are rate limited. Please wait and retry.");
                }
            }
        }
        return Ok(EXIT_UNAVAILABLE);
    };

    if record {
        service.record_usage(&selection.credential)?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&selection)?),
        OutputFormat::Text => println!("{}", selection.credential),
    }
    Ok(0)
}

pub(crate) fn handle_record(
    service: &CredentialService,
    key: &str,
    format: OutputFormat,
) -> Result<i32> {
    service.record_usage(key)?;
    if let OutputFormat::Json = format {
        println!("{}", json!({ "recorded": mask(key) }));
    }
    Ok(0)
}

pub(crate) fn handle_status(service: &CredentialService, format: OutputFormat) -> Result<i32> {
    let status = service.status();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&status)?),
        OutputFormat::Text => {
            let policy = service.rate_limit();
            println!(
                "Limit: {} requests per {}s",
                policy.max_requests,
                policy.window.as_secs()
            );
            for entry in &status {
                println!(
                    "{}{}\t{}\t{}/{}{}",
                    if entry.next { "> " } else { "  " },
                    entry.index,
                    entry.masked,
                    entry.recent_usage,
                    policy.max_requests,
                    if entry.throttled { "\tTHROTTLED" } else { "" }
                );
            }
        }
    }
    Ok(0)
}

pub(crate) fn handle_validate(
    service: &CredentialService,
    key: &str,
    format: OutputFormat,
) -> Result<i32> {
    let result = service.validate_format(key);
    match format {
        OutputFormat::Json => match &result {
            Ok(()) => println!("{}", json!({ "valid": true })),
            Err(rejection) => {
                let value = json!({
                    "valid": false,
                    "reason": rejection.code(),
                    "message": rejection.to_string(),
                });
                println!("{value}");
            }
        },
        OutputFormat::Text => match &result {
            Ok(()) => println!("valid"),
            Err(rejection) => eprintln!("invalid: {rejection}"),
        },
    }
    Ok(if result.is_ok() { 0 } else { EXIT_REJECTED })
}

pub(crate) fn handle_clear(service: &CredentialService, format: OutputFormat) -> Result<i32> {
    service.clear_all()?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "cleared": true })),
        OutputFormat::Text => println!("Cleared credential pool"),
    }
    Ok(0)
}

/// Classification needs no pool, so it runs before the store is opened.
pub(crate) fn handle_classify(message: &str, format: OutputFormat) -> Result<()> {
    let kind = classify_failure(message);
    match format {
        OutputFormat::Json => {
            let value = json!({
                "kind": kind,
                "rotate": kind.should_rotate(),
                "hint": kind.hint(),
            });
            println!("{value}");
        }
        OutputFormat::Text => {
            let action = if kind.should_rotate() {
                "rotate to the next credential"
            } else {
                "do not rotate"
            };
            println!("{kind:?}: {action}");
            println!("{}", kind.hint());
        }
    }
    Ok(())
}

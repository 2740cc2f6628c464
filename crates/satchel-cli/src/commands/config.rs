//! Config command handler

use anyhow::{bail, Result};

use satchel_core::Config;

use crate::output::{Output, OutputFormat};

/// Show the current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load()?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        _ => {
            println!("data_dir           = {}", config.data_dir.display());
            println!(
                "api_url            = {}",
                config.api_url.as_deref().unwrap_or("(not set)")
            );
            println!("sync_enabled       = {}", config.sync_enabled);
            println!("sync_interval_secs = {}", config.sync_interval_secs);
        }
    }

    Ok(())
}

/// Set a configuration value and save the config file
pub fn set(key: &str, value: &str, output: &Output) -> Result<()> {
    let mut config = Config::load()?;

    match key {
        "data_dir" => config.data_dir = value.into(),
        "api_url" => {
            config.api_url = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }
        "sync_enabled" => {
            config.sync_enabled = value.eq_ignore_ascii_case("true") || value == "1";
        }
        "sync_interval_secs" => {
            config.sync_interval_secs = value
                .parse()
                .map_err(|_| anyhow::anyhow!("sync_interval_secs must be a number: {value}"))?;
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .map_err(|_| anyhow::anyhow!("request_timeout_secs must be a number: {value}"))?;
        }
        _ => bail!(
            "Unknown configuration key: {key}\n\
             Valid keys: data_dir, api_url, sync_enabled, sync_interval_secs, request_timeout_secs"
        ),
    }

    config.save()?;
    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

use std::path::Path;

use crate::cli::ConfigCommands;
use crate::config::{normalize_http_url, CliConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            probe_url,
            probe_interval,
            max_attempts,
        } => {
            let updates = ConfigUpdates {
                supabase_url,
                supabase_anon_key,
                probe_url,
                probe_interval,
                max_attempts,
            };
            let config = run_config_init(updates, path)?;
            println!("Saved CLI config to {}", path.display());
            if !config.has_remote() {
                println!("Supabase URL or anon key missing; saves will stay queued locally.");
            }
            Ok(())
        }
        ConfigCommands::Show { json } => {
            let mut config = CliConfig::load_from_path(path).map_err(CliError::Config)?;
            config.apply_env(|name| std::env::var(name).ok());
            if json {
                println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
            } else {
                for line in format_config_lines(&config, path) {
                    println!("{line}");
                }
            }
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigUpdates {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub probe_url: Option<String>,
    pub probe_interval: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Merge explicit values into the stored config and write it back.
pub fn run_config_init(updates: ConfigUpdates, path: &Path) -> Result<CliConfig, CliError> {
    let mut config = CliConfig::load_from_path(path).map_err(CliError::Config)?;

    if let Some(url) =
        normalize_http_url("supabase_url", updates.supabase_url).map_err(CliError::Config)?
    {
        config.supabase_url = Some(url);
    }
    if let Some(key) = embraceu_core::util::normalize_text_option(updates.supabase_anon_key) {
        config.supabase_anon_key = Some(key);
    }
    if let Some(url) =
        normalize_http_url("probe_url", updates.probe_url).map_err(CliError::Config)?
    {
        config.probe_url = Some(url);
    }
    if updates.probe_interval.is_some() {
        config.probe_interval_secs = updates.probe_interval;
    }
    if updates.max_attempts.is_some() {
        config.max_attempts = updates.max_attempts;
    }

    config.save_to_path(path).map_err(CliError::Config)?;
    Ok(config)
}

fn redacted(config: &CliConfig) -> CliConfig {
    CliConfig {
        supabase_anon_key: config.supabase_anon_key.as_ref().map(|_| "<set>".to_string()),
        ..config.clone()
    }
}

pub fn format_config_lines(config: &CliConfig, path: &Path) -> Vec<String> {
    let show = |value: Option<&str>| value.unwrap_or("(not set)").to_string();
    let presence = |set: bool| if set { "set" } else { "(not set)" };
    vec![
        format!("Config file:    {}", path.display()),
        format!("Supabase URL:   {}", show(config.supabase_url.as_deref())),
        format!("Anon key:       {}", presence(config.supabase_anon_key.is_some())),
        format!("Access token:   {}", presence(config.access_token.is_some())),
        format!("Probe URL:      {}", show(config.resolved_probe_url().as_deref())),
        format!("Probe interval: {}s", config.probe_interval().as_secs()),
        format!(
            "Max attempts:   {}",
            config
                .queue_max_attempts()
                .map_or_else(|| "unlimited".to_string(), |limit| limit.to_string())
        ),
    ]
}

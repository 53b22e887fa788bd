//! Persistent CLI configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use embraceu_core::queue::DEFAULT_MAX_ATTEMPTS;
use embraceu_core::remote::normalize_rest_url;
use embraceu_core::util::{is_http_url, normalize_text_option};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

pub const ENV_SUPABASE_URL: &str = "EMBRACEU_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "EMBRACEU_SUPABASE_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "EMBRACEU_ACCESS_TOKEN";
pub const ENV_PROBE_URL: &str = "EMBRACEU_PROBE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub probe_url: Option<String>,
    #[serde(default)]
    pub probe_interval_secs: Option<u64>,
    /// `Some(0)` disables dead-lettering
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Only ever taken from the environment
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            supabase_url: None,
            supabase_anon_key: None,
            probe_url: None,
            probe_interval_secs: None,
            max_attempts: None,
            access_token: None,
        }
    }
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("embraceu")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_http_url(field: &str, value: Option<String>) -> Result<Option<String>, String> {
    match normalize_text_option(value) {
        Some(url) if is_http_url(&url) => Ok(Some(url.trim_end_matches('/').to_string())),
        Some(url) => Err(format!("{field} must start with http:// or https:// (got {url})")),
        None => Ok(None),
    }
}

impl CliConfig {
    /// Config file merged with environment overrides.
    pub fn load_effective() -> Result<Self, String> {
        let mut config = Self::load_from_path(&default_config_path())?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Environment values win over the file when set and non-blank.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = normalize_text_option(lookup(ENV_SUPABASE_URL)) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY)) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(url) = normalize_text_option(lookup(ENV_PROBE_URL)) {
            self.probe_url = Some(url);
        }
        self.access_token = normalize_text_option(lookup(ENV_ACCESS_TOKEN));
    }

    pub fn has_remote(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_anon_key.is_some()
    }

    /// Explicit probe URL, else the Supabase REST root.
    pub fn resolved_probe_url(&self) -> Option<String> {
        if let Some(url) = &self.probe_url {
            return Some(url.clone());
        }
        self.supabase_url
            .as_deref()
            .and_then(|url| normalize_rest_url(url).ok())
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(
            self.probe_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS),
        )
    }

    pub fn queue_max_attempts(&self) -> Option<u32> {
        match self.max_attempts {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => Some(DEFAULT_MAX_ATTEMPTS),
        }
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.take());
        self.probe_url = normalize_text_option(self.probe_url.take());
    }
}

/// Service configuration loader - parses vitalweather.toml
///
/// Separates deployment settings (schedule, state backend, ingestion
/// endpoint) and per-integration action configurations from code, so
/// credentials and pull windows change without recompiling the service.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::ingest::vitalweather::VW_BASE_URL;

pub const DEFAULT_CONFIG_PATH: &str = "vitalweather.toml";

/// Environment fallback for `[ingestion] api_key`.
pub const INGESTION_API_KEY_ENV: &str = "INGESTION_API_KEY";

/// Longest accepted poll interval: one week.
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// File structure
// ---------------------------------------------------------------------------

/// Root of vitalweather.toml
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: ServiceSettings,
    pub ingestion: IngestionSettings,
    #[serde(default, rename = "integration")]
    pub integrations: Vec<Integration>,
}

/// Which `StateStore` backs the history watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    File,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    /// How often `pull_observations` runs for each integration
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,

    /// UTC hour at which `fetch_daily_summary` runs
    #[serde(default = "default_summary_hour")]
    pub daily_summary_hour_utc: u32,

    /// Worker pool size for fanned-out per-station actions
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    #[serde(default = "default_state_backend")]
    pub state_backend: StateBackend,

    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_summary_hour() -> u32 {
    1
}

fn default_worker_threads() -> usize {
    4
}

fn default_state_backend() -> StateBackend {
    StateBackend::File
}

fn default_state_file() -> String {
    "vitalweather_state.json".to_string()
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            poll_interval_minutes: default_poll_interval(),
            daily_summary_hour_utc: default_summary_hour(),
            worker_threads: default_worker_threads(),
            state_backend: default_state_backend(),
            state_file: default_state_file(),
        }
    }
}

/// Downstream ingestion service
#[derive(Clone, Deserialize)]
pub struct IngestionSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for IngestionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "**********"))
            .finish()
    }
}

impl IngestionSettings {
    /// The configured key, or `INGESTION_API_KEY` from the environment / `.env`.
    pub fn resolved_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        dotenv::dotenv().ok();
        std::env::var(INGESTION_API_KEY_ENV).map_err(|_| {
            ConfigError::Invalid(format!(
                "[ingestion] api_key is not set and {} is not in the environment",
                INGESTION_API_KEY_ENV
            ))
        })
    }
}

/// One VitalWeather account and the settings of each of its actions.
#[derive(Debug, Clone, Deserialize)]
pub struct Integration {
    pub id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub configurations: Vec<ActionConfiguration>,
}

/// Raw settings for one action; typed in `actions::configurations`.
#[derive(Clone, Deserialize)]
pub struct ActionConfiguration {
    pub action_id: String,
    #[serde(default = "empty_table")]
    pub data: Value,
}

fn empty_table() -> Value {
    Value::Object(Default::default())
}

impl std::fmt::Debug for ActionConfiguration {
    // `data` may hold the API key
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionConfiguration")
            .field("action_id", &self.action_id)
            .finish_non_exhaustive()
    }
}

impl Integration {
    /// API base URL, falling back to the public VitalWeather endpoint.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(VW_BASE_URL)
    }

    pub fn find_config_for_action(&self, action_id: &str) -> Option<&ActionConfiguration> {
        self.configurations.iter().find(|c| c.action_id == action_id)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads and validates the service configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_config(&contents)
}

/// Parses and validates configuration text.
pub fn parse_config(contents: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig =
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    let service = &config.service;
    if service.poll_interval_minutes == 0 || service.poll_interval_minutes > MAX_POLL_INTERVAL_MINUTES {
        return Err(ConfigError::Invalid(format!(
            "poll_interval_minutes must be 1-{}, got {}",
            MAX_POLL_INTERVAL_MINUTES, service.poll_interval_minutes
        )));
    }
    if service.daily_summary_hour_utc > 23 {
        return Err(ConfigError::Invalid(format!(
            "daily_summary_hour_utc must be 0-23, got {}",
            service.daily_summary_hour_utc
        )));
    }
    if service.worker_threads == 0 {
        return Err(ConfigError::Invalid("worker_threads must be > 0".to_string()));
    }

    let mut seen = HashSet::new();
    for integration in &config.integrations {
        if integration.id.is_empty() {
            return Err(ConfigError::Invalid("integration id must not be empty".to_string()));
        }
        if !seen.insert(integration.id.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "integration '{}' is defined more than once",
                integration.id
            )));
        }
    }
    Ok(())
}

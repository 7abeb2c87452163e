/// Typed per-action configurations.
///
/// Raw settings live in `vitalweather.toml` as free-form tables keyed by
/// action id. Each action reads its table into one of the structs below,
/// optionally overlaid with the overrides carried by an `ActionRequest`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ActionError, ActionId};
use crate::config::Integration;
use crate::model::Station;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 15;
pub const MAX_LOOKBACK_DAYS: u32 = 30;

/// Credentials for the VitalWeather API.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticateConfig {
    pub key: String,
}

impl std::fmt::Debug for AuthenticateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticateConfig")
            .field("key", &"**********")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullObservationsConfig {
    /// History window for a station that has never been pulled.
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: u32,
    /// Fan out to `pull_station_history` instead of `pull_station_conditions`.
    #[serde(default)]
    pub fetch_history: bool,
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

impl Default for PullObservationsConfig {
    fn default() -> Self {
        Self {
            default_lookback_days: DEFAULT_LOOKBACK_DAYS,
            fetch_history: false,
        }
    }
}

impl PullObservationsConfig {
    pub fn validate(&self) -> Result<(), ActionError> {
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.default_lookback_days) {
            return Err(ActionError::InvalidConfiguration(format!(
                "default_lookback_days must be between 1 and {}, got {}",
                MAX_LOOKBACK_DAYS, self.default_lookback_days
            )));
        }
        Ok(())
    }

    /// Station action each fanned-out request runs.
    pub fn station_action(&self) -> ActionId {
        if self.fetch_history {
            ActionId::PullStationHistory
        } else {
            ActionId::PullStationConditions
        }
    }
}

/// Configuration of a per-station action: the station itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullStationConfig {
    pub station: Station,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchDailySummaryConfig {}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Shallow merge: top-level keys of `overrides` replace those of `base`.
pub fn merge_overrides(base: &Value, overrides: Option<&Value>) -> Value {
    let mut merged = match base {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Some(Value::Object(extra)) = overrides {
        for (key, value) in extra {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Reads an action's stored settings into `T`, applying `overrides`.
///
/// With `required` set, an action with neither stored settings nor
/// overrides is `ConfigurationNotFound`; otherwise `T` is built from an
/// empty table (serde defaults apply).
pub fn resolve_config<T: DeserializeOwned>(
    integration: &Integration,
    action: ActionId,
    overrides: Option<&Value>,
    required: bool,
) -> Result<T, ActionError> {
    let stored = integration.find_config_for_action(action.as_str());
    if stored.is_none() && overrides.is_none() && required {
        return Err(missing_configuration(integration, action));
    }

    let base = stored.map(|c| c.data.clone()).unwrap_or(Value::Null);
    let merged = merge_overrides(&base, overrides);

    serde_json::from_value(merged).map_err(|e| {
        ActionError::InvalidConfiguration(format!(
            "'{}' settings for integration {}: {}",
            action, integration.id, e
        ))
    })
}

fn missing_configuration(integration: &Integration, action: ActionId) -> ActionError {
    let what = match action {
        ActionId::Auth => "Authentication",
        ActionId::PullObservations => "Pull observations",
        _ => action.as_str(),
    };
    ActionError::ConfigurationNotFound(format!(
        "{} settings for integration {} are missing. Please fix the integration setup in the portal.",
        what, integration.id
    ))
}

/// Stored API credentials of an integration.
pub fn get_auth_config(integration: &Integration) -> Result<AuthenticateConfig, ActionError> {
    resolve_config(integration, ActionId::Auth, None, true)
}

/// Stored pull-window settings of an integration, validated.
pub fn get_pull_config(integration: &Integration) -> Result<PullObservationsConfig, ActionError> {
    let config: PullObservationsConfig =
        resolve_config(integration, ActionId::PullObservations, None, true)?;
    config.validate()?;
    Ok(config)
}

impl Integration {
    pub fn auth_config(&self) -> Result<AuthenticateConfig, ActionError> {
        get_auth_config(self)
    }

    pub fn pull_config(&self) -> Result<PullObservationsConfig, ActionError> {
        get_pull_config(self)
    }
}

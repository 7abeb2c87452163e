/// Integration actions: typed configurations, handlers and the dispatcher.
///
/// | action                    | trigger                  | unit of work        |
/// |---------------------------|--------------------------|---------------------|
/// | `auth`                    | on demand                | credential check    |
/// | `pull_observations`       | every poll interval      | fan-out to stations |
/// | `pull_station_conditions` | triggered per station    | latest conditions   |
/// | `pull_station_history`    | triggered per station    | watermark window    |
/// | `fetch_daily_summary`     | daily, 01:00 UTC         | all stations        |

pub mod configurations;
pub mod handlers;
pub mod runner;

use crate::model::VwError;
use crate::scheduler::ScheduleError;
use crate::sender::SendError;
use crate::state::StateError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Action identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionId {
    Auth,
    PullObservations,
    PullStationConditions,
    PullStationHistory,
    FetchDailySummary,
}

impl ActionId {
    pub const ALL: [ActionId; 5] = [
        ActionId::Auth,
        ActionId::PullObservations,
        ActionId::PullStationConditions,
        ActionId::PullStationHistory,
        ActionId::FetchDailySummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionId::Auth => "auth",
            ActionId::PullObservations => "pull_observations",
            ActionId::PullStationConditions => "pull_station_conditions",
            ActionId::PullStationHistory => "pull_station_history",
            ActionId::FetchDailySummary => "fetch_daily_summary",
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionId {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionId::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ActionError::UnknownAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Client(#[from] VwError),
    #[error("{0}")]
    ConfigurationNotFound(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("integration '{0}' is not configured")]
    IntegrationNotFound(String),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

impl ActionError {
    /// HTTP status the action endpoint reports for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            ActionError::Client(e) => match e.status_code() {
                Some(code) if (400..600).contains(&code) => code as u16,
                _ => 502,
            },
            ActionError::ConfigurationNotFound(_) | ActionError::IntegrationNotFound(_) => 404,
            ActionError::InvalidConfiguration(_) | ActionError::UnknownAction(_) => 400,
            ActionError::Send(_) => 502,
            ActionError::State(_) | ActionError::Schedule(_) => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResult {
    pub valid_credentials: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullObservationsResult {
    pub stations_triggered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationPullResult {
    pub observations_extracted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummaryResult {
    pub summaries_fetched: usize,
}

/// Action triggering and daily schedule computation.
///
/// A fan-out handler never runs per-station work itself: it submits one
/// `ActionRequest` per station through an `ActionScheduler`. The daemon's
/// `QueueScheduler` puts requests on a channel that the worker pool drains,
/// so stations are processed (and fail) independently.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::mpsc;

/// One unit of work: run `action_id` for `integration_id`.
///
/// Station actions carry their station in `config_overrides`; scheduled
/// actions leave it empty and use the integration's stored configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub integration_id: String,
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_overrides: Option<Value>,
}

impl ActionRequest {
    pub fn new(integration_id: &str, action_id: &str, config_overrides: Option<Value>) -> Self {
        Self {
            integration_id: integration_id.to_string(),
            action_id: action_id.to_string(),
            config_overrides,
        }
    }

    /// Station targeted by a per-station action, if any.
    pub fn station_id(&self) -> Option<i64> {
        self.config_overrides
            .as_ref()?
            .get("station")?
            .get("Station_ID")?
            .as_i64()
    }

    /// Identity used to keep one station's work from running twice at once.
    pub fn work_key(&self) -> String {
        match self.station_id() {
            Some(station) => format!("{}/{}/{}", self.integration_id, self.action_id, station),
            None => format!("{}/{}", self.integration_id, self.action_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("action queue is closed")]
    QueueClosed,
}

/// Enqueues units of work for later execution.
pub trait ActionScheduler: Send + Sync {
    fn trigger_action(
        &self,
        integration_id: &str,
        action_id: &str,
        config: Value,
    ) -> Result<(), ScheduleError>;
}

/// `ActionScheduler` backed by an in-process channel.
pub struct QueueScheduler {
    tx: mpsc::Sender<ActionRequest>,
}

impl QueueScheduler {
    /// Scheduler plus the receiving end the daemon drains.
    pub fn channel() -> (Self, mpsc::Receiver<ActionRequest>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl ActionScheduler for QueueScheduler {
    fn trigger_action(
        &self,
        integration_id: &str,
        action_id: &str,
        config: Value,
    ) -> Result<(), ScheduleError> {
        let request = ActionRequest::new(integration_id, action_id, Some(config));
        log::debug!("Queued '{}' ({})", action_id, request.work_key());
        self.tx.send(request).map_err(|_| ScheduleError::QueueClosed)
    }
}

/// Next `hour:00` UTC strictly after `after`.
pub fn next_daily_run(after: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = after.date_naive().and_time(time).and_utc();
    if today > after {
        today
    } else {
        today + Duration::days(1)
    }
}

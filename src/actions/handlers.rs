/// Action handlers.
///
/// Each handler takes its collaborators from an `ActionContext`, so the
/// daemon wires real HTTP clients and state backends while tests pass fakes.
/// Handlers log and return errors; they never retry on their own (the
/// VitalWeather client already retries transient failures).

use std::sync::Arc;

use chrono::Utc;

use super::configurations::{
    get_auth_config, get_pull_config, AuthenticateConfig, FetchDailySummaryConfig,
    PullObservationsConfig, PullStationConfig,
};
use super::{
    ActionError, ActionId, AuthResult, DailySummaryResult, PullObservationsResult,
    StationPullResult,
};
use crate::config::Integration;
use crate::ingest::vitalweather::WeatherApi;
use crate::model::{Fetched, Observation, Station};
use crate::scheduler::ActionScheduler;
use crate::sender::{generate_batches, EventSink, OBSERVATION_BATCH_SIZE};
use crate::state::{window_start, WatermarkStore};
use crate::transform::{latest_timestamp, transform_daily_summary, transform_readings};

/// Collaborators shared by every handler.
#[derive(Clone)]
pub struct ActionContext {
    pub api: Arc<dyn WeatherApi>,
    pub sink: Arc<dyn EventSink>,
    pub scheduler: Arc<dyn ActionScheduler>,
    pub watermarks: WatermarkStore,
}

/// Checks credentials by listing the account's stations.
///
/// Never fails: every outcome is reported in the result.
pub fn action_auth(
    ctx: &ActionContext,
    integration: &Integration,
    config: &AuthenticateConfig,
) -> AuthResult {
    log::info!("Executing auth action with integration {}", integration.id);

    match ctx.api.fetch_stations(integration.base_url(), &config.key) {
        Ok(Fetched::Data(response)) if !response.stations.is_empty() => AuthResult {
            valid_credentials: true,
            status_code: None,
            message: None,
        },
        Ok(_) => {
            log::warn!("Auth for integration {} returned no stations", integration.id);
            AuthResult {
                valid_credentials: false,
                status_code: None,
                message: Some("Bad credentials".to_string()),
            }
        }
        Err(e) => {
            log::warn!("Auth for integration {} failed: {}", integration.id, e);
            AuthResult {
                valid_credentials: false,
                status_code: e.status_code(),
                message: Some(e.message()),
            }
        }
    }
}

/// Lists stations and triggers one station action per station.
pub fn action_pull_observations(
    ctx: &ActionContext,
    integration: &Integration,
    config: &PullObservationsConfig,
) -> Result<PullObservationsResult, ActionError> {
    config.validate()?;
    let auth = get_auth_config(integration)?;

    log::info!("Executing pull_observations action with integration {}", integration.id);

    let stations = match ctx.api.fetch_stations(integration.base_url(), &auth.key) {
        Ok(response) => response,
        Err(e) => {
            log::error!(
                "Failed to list stations for integration {}: {}",
                integration.id,
                e
            );
            return Err(e.into());
        }
    };

    let Some(stations) = stations.into_data() else {
        log::warn!("No stations returned for integration {}", integration.id);
        return Ok(PullObservationsResult { stations_triggered: 0 });
    };

    let target = config.station_action();
    let mut triggered = 0;
    for station in stations.stations {
        let station_config = serde_json::to_value(PullStationConfig { station })
            .map_err(|e| ActionError::InvalidConfiguration(e.to_string()))?;
        ctx.scheduler
            .trigger_action(&integration.id, target.as_str(), station_config)?;
        triggered += 1;
    }

    log::info!(
        "Triggered '{}' for {} stations (integration {})",
        target,
        triggered,
        integration.id
    );

    Ok(PullObservationsResult { stations_triggered: triggered })
}

/// Sends the latest conditions of one station.
pub fn action_pull_station_conditions(
    ctx: &ActionContext,
    integration: &Integration,
    config: &PullStationConfig,
) -> Result<StationPullResult, ActionError> {
    let auth = get_auth_config(integration)?;
    let station = &config.station;

    log::info!(
        "Executing pull_station_conditions for station {} ({}) with integration {}",
        station.id,
        station.name,
        integration.id
    );

    let response = ctx
        .api
        .fetch_latest_conditions(integration.base_url(), &auth.key, station.id)
        .inspect_err(|e| {
            log::error!("Failed to get conditions for station {}: {}", station.id, e);
        })?;

    let Some(conditions) = response.into_data() else {
        log::warn!("No conditions returned for station {}", station.id);
        return Ok(StationPullResult { observations_extracted: 0 });
    };

    let observations = transform_readings(station, &conditions);
    let extracted = forward_observations(ctx, &integration.id, station, &observations)?;

    Ok(StationPullResult { observations_extracted: extracted })
}

/// Sends one station's readings since its watermark, then advances it.
///
/// The watermark only moves after every batch was delivered, so a failed
/// run is retried from the same point.
pub fn action_pull_station_history(
    ctx: &ActionContext,
    integration: &Integration,
    config: &PullStationConfig,
) -> Result<StationPullResult, ActionError> {
    let auth = get_auth_config(integration)?;
    let pull = get_pull_config(integration)?;
    let station = &config.station;
    let action = ActionId::PullStationHistory.as_str();

    let now = Utc::now();
    let watermark = ctx.watermarks.load(&integration.id, action, station.id)?;
    let from_ts = window_start(watermark, now, pull.default_lookback_days);
    let to_ts = now.timestamp();

    log::info!(
        "Executing pull_station_history for station {} with integration {} (window {} - {})",
        station.id,
        integration.id,
        from_ts,
        to_ts
    );

    let response = ctx
        .api
        .fetch_history(integration.base_url(), &auth.key, station.id, from_ts, to_ts)
        .inspect_err(|e| {
            log::error!("Failed to get history for station {}: {}", station.id, e);
        })?;

    let Some(history) = response.into_data() else {
        log::warn!("No history returned for station {}", station.id);
        return Ok(StationPullResult { observations_extracted: 0 });
    };

    let observations = transform_readings(station, &history);
    let extracted = forward_observations(ctx, &integration.id, station, &observations)?;

    if let Some(latest) = latest_timestamp(&history.history) {
        ctx.watermarks.commit(&integration.id, action, station.id, latest)?;
        log::info!("Station {} watermark advanced to {}", station.id, latest);
    }

    Ok(StationPullResult { observations_extracted: extracted })
}

/// Sends yesterday's summary of every station as events.
pub fn action_fetch_daily_summary(
    ctx: &ActionContext,
    integration: &Integration,
    _config: &FetchDailySummaryConfig,
) -> Result<DailySummaryResult, ActionError> {
    let auth = get_auth_config(integration)?;
    let base_url = integration.base_url();

    log::info!("Executing fetch_daily_summary action with integration {}", integration.id);

    let stations = ctx
        .api
        .fetch_stations(base_url, &auth.key)
        .inspect_err(|e| {
            log::error!("Failed to list stations for integration {}: {}", integration.id, e);
        })?;

    let Some(stations) = stations.into_data() else {
        log::warn!("No stations returned for integration {}", integration.id);
        return Ok(DailySummaryResult { summaries_fetched: 0 });
    };

    let mut fetched = 0;
    for station in &stations.stations {
        let response = ctx
            .api
            .fetch_daily_summary(base_url, &auth.key, station.id)
            .inspect_err(|e| {
                log::error!("Failed to get daily summary for station {}: {}", station.id, e);
            })?;

        let Some(summary) = response.into_data() else {
            log::warn!("No daily summary returned for station {}", station.id);
            continue;
        };

        let events = transform_daily_summary(station, &summary.summaries, &summary.units);
        for batch in generate_batches(&events, OBSERVATION_BATCH_SIZE) {
            let accepted = ctx.sink.send_events(batch, &integration.id)?;
            fetched += accepted.len();
        }
    }

    log::info!(
        "Daily summaries sent for integration {}: {}",
        integration.id,
        fetched
    );

    Ok(DailySummaryResult { summaries_fetched: fetched })
}

/// Delivers observations in batches; returns how many were accepted.
fn forward_observations(
    ctx: &ActionContext,
    integration_id: &str,
    station: &Station,
    observations: &[Observation],
) -> Result<usize, ActionError> {
    if observations.is_empty() {
        log::info!("No observations to send for station {}", station.id);
        return Ok(0);
    }

    let mut accepted = 0;
    for batch in generate_batches(observations, OBSERVATION_BATCH_SIZE) {
        log::info!(
            "Sending {} observations for station {} ({})",
            batch.len(),
            station.id,
            station.name
        );
        accepted += ctx.sink.send_observations(batch, integration_id)?.len();
    }
    Ok(accepted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

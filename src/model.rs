/// Core data types for the VitalWeather connector.
///
/// This module defines the shared domain model imported by all other modules:
/// the wire shapes of the four VitalWeather endpoints, the canonical
/// observation/event records sent downstream, and the client error taxonomy.
/// It performs no I/O.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Canonical record constants
// ---------------------------------------------------------------------------

pub const OBSERVATION_TYPE: &str = "stationary-object";
pub const OBSERVATION_SUBTYPE: &str = "weather_station";
pub const SUMMARY_EVENT_TYPE: &str = "weather_station_summary";

/// Success value of the `code` field in every response envelope.
pub const API_CODE_OK: i64 = 200;

// ---------------------------------------------------------------------------
// Timestamp normalization
// ---------------------------------------------------------------------------

/// Parses a VitalWeather timestamp string.
///
/// The API emits naive timestamps that are really UTC, so any value without
/// an explicit offset gets `+00:00`. Values carrying an offset keep it.
pub fn normalize_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }

    // Some endpoints quote epoch seconds
    if let Ok(secs) = raw.parse::<i64>() {
        return timestamp_from_epoch(secs);
    }

    Err(format!("unrecognized timestamp '{}'", raw))
}

/// Converts epoch seconds to a UTC timestamp.
pub fn timestamp_from_epoch(secs: i64) -> Result<DateTime<FixedOffset>, String> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| format!("epoch {} out of range", secs))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Epoch(i64),
    EpochFloat(f64),
    Text(String),
}

/// Serde hook for `generated_at` and `ts` fields: epoch numbers or strings,
/// naive values interpreted as UTC.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Epoch(secs) => timestamp_from_epoch(secs),
        RawTimestamp::EpochFloat(secs) => timestamp_from_epoch(secs.trunc() as i64),
        RawTimestamp::Text(text) => normalize_timestamp(&text),
    };
    parsed.map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

/// A VitalWeather station as listed by `stations.php`.
///
/// Serializes back to the wire names so a station can travel inside a
/// scheduled action's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "Station_ID")]
    pub id: i64,
    #[serde(rename = "Station_Name")]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationsResponse {
    #[serde(default)]
    pub stations: Vec<Station>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub generated_at: DateTime<FixedOffset>,
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Readings (latest conditions + history)
// ---------------------------------------------------------------------------

/// Field name -> unit label. Labels are strings for readings; the daily
/// summary table also carries arrays such as `["°", "DIR"]`.
pub type UnitTable = BTreeMap<String, Value>;

/// One station reading. Shared by the conditions and history endpoints.
///
/// Serialized names follow the unit table keys (`wind_average`,
/// `wind_direction`, `total_rain`); the short aliases are accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub ts: DateTime<FixedOffset>,
    pub pressure: f64,
    pub temperature: f64,
    pub humidity: i64,
    pub wind_min: i64,
    #[serde(rename = "wind_average", alias = "wind_avg")]
    pub wind_avg: f64,
    pub wind_max: f64,
    #[serde(rename = "wind_direction", alias = "wind_dir")]
    pub wind_dir: i64,
    #[serde(rename = "total_rain", alias = "Rain")]
    pub rain: f64,
    pub uv: f64,
    pub solar_radiation: f64,
}

pub type ConditionsRecord = Reading;
pub type HistoryRecord = Reading;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConditionsResponse {
    #[serde(default)]
    pub conditions: Vec<ConditionsRecord>,
    #[serde(rename = "units", alias = "unites", default)]
    pub units: UnitTable,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub generated_at: DateTime<FixedOffset>,
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryResponse {
    #[serde(rename = "History", default)]
    pub history: Vec<HistoryRecord>,
    #[serde(rename = "unites", alias = "units", default)]
    pub units: UnitTable,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub generated_at: DateTime<FixedOffset>,
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Anything carrying readings plus the unit table that decorates them.
pub trait ReadingsPayload {
    fn readings(&self) -> &[Reading];
    fn units(&self) -> &UnitTable;
}

impl ReadingsPayload for ConditionsResponse {
    fn readings(&self) -> &[Reading] {
        &self.conditions
    }
    fn units(&self) -> &UnitTable {
        &self.units
    }
}

impl ReadingsPayload for HistoryResponse {
    fn readings(&self) -> &[Reading] {
        &self.history
    }
    fn units(&self) -> &UnitTable {
        &self.units
    }
}

// ---------------------------------------------------------------------------
// Daily summary
// ---------------------------------------------------------------------------

/// `[degrees, compass point]`, e.g. `[225, "SW"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindDirection(pub i64, pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummaryRecord {
    pub station_id: i64,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    pub rain: f64,
    pub avg_temp: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    #[serde(rename = "avg_RH")]
    pub avg_rh: i64,
    #[serde(rename = "min_RH")]
    pub min_rh: i64,
    #[serde(rename = "max_RH")]
    pub max_rh: i64,
    pub avg_wind: f64,
    pub avg_solar: f64,
    pub avg_pressure: f64,
    pub min_pressure: f64,
    pub max_pressure: f64,
    pub avg_winddirection: WindDirection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailySummaryResponse {
    #[serde(rename = "dailysummary", default)]
    pub summaries: Vec<DailySummaryRecord>,
    #[serde(rename = "unites", alias = "units", default)]
    pub units: UnitTable,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub generated_at: DateTime<FixedOffset>,
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Fetch outcome
// ---------------------------------------------------------------------------

/// Result of a successful HTTP exchange. An empty body is a valid outcome
/// distinct from failure, and keeps the raw text for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Data(T),
    NoData { raw: String },
}

impl<T> Fetched<T> {
    pub fn into_data(self) -> Option<T> {
        match self {
            Fetched::Data(data) => Some(data),
            Fetched::NoData { .. } => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Fetched::NoData { .. })
    }
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl From<&Station> for Location {
    fn from(station: &Station) -> Self {
        Location {
            lat: station.latitude,
            lon: station.longitude,
        }
    }
}

/// Observation in the shape the ingestion service accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub source_name: String,
    pub source: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: String,
    pub recorded_at: DateTime<FixedOffset>,
    pub location: Location,
    pub additional: Map<String, Value>,
}

/// Event produced from a station's daily summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub event_type: String,
    pub recorded_at: DateTime<chrono::Utc>,
    pub location: Location,
    pub event_details: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by the VitalWeather client.
///
/// Transport failures and application failures are kept apart: an `Api`
/// error arrives on an HTTP success with a non-200 `code` in the body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VwError {
    /// Connection failure, timeout or an HTTP error status other than 401/404.
    #[error("transport error: {message}")]
    Transport { status: Option<u16>, message: String },
    #[error("401: {message}")]
    Unauthorized { message: String },
    #[error("404: {message}")]
    NotFound { message: String },
    #[error("{code}: {message}")]
    Api { code: i64, message: String },
    /// The body was not JSON or did not match the endpoint's shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl VwError {
    /// Status code reported to callers: the HTTP status, or the body's
    /// `code` for application failures.
    pub fn status_code(&self) -> Option<i64> {
        match self {
            VwError::Transport { status, .. } => status.map(i64::from),
            VwError::Unauthorized { .. } => Some(401),
            VwError::NotFound { .. } => Some(404),
            VwError::Api { code, .. } => Some(*code),
            VwError::Parse(_) => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            VwError::Transport { message, .. }
            | VwError::Unauthorized { message }
            | VwError::NotFound { message }
            | VwError::Api { message, .. } => message.clone(),
            VwError::Parse(msg) => msg.clone(),
        }
    }

    /// Connection-level failures and 5xx responses are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            VwError::Transport { status: None, .. } => true,
            VwError::Transport { status: Some(code), .. } => *code >= 500,
            _ => false,
        }
    }
}

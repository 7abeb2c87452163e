/// VitalWeather station API client.
///
/// Handles URL construction, status/envelope validation and JSON parsing for
/// the four endpoints the connector uses:
///   GET /stations.php?key=
///   GET /conditions.php/{station}?key=
///   GET /history.php?ID=&key=&from=&to=
///   GET /dailysummary.php/{station}?key=
///
/// See `fixtures.rs` for annotated examples of the response envelope.

use crate::model::{
    ConditionsResponse, DailySummaryResponse, Fetched, HistoryResponse, StationsResponse,
    VwError, API_CODE_OK,
};
use crate::retry::RetryPolicy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub const VW_BASE_URL: &str = "https://www.vitalweather.co.za/api/v1";

/// Per-request timeout, covering connect and body download.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

pub fn build_stations_url(base_url: &str, api_key: &str) -> String {
    format!(
        "{}/stations.php?key={}",
        trim_base(base_url),
        urlencoding::encode(api_key)
    )
}

pub fn build_conditions_url(base_url: &str, api_key: &str, station_id: i64) -> String {
    format!(
        "{}/conditions.php/{}?key={}",
        trim_base(base_url),
        station_id,
        urlencoding::encode(api_key)
    )
}

/// History window bounds are epoch seconds.
pub fn build_history_url(
    base_url: &str,
    api_key: &str,
    station_id: i64,
    from_ts: i64,
    to_ts: i64,
) -> String {
    format!(
        "{}/history.php?ID={}&key={}&from={}&to={}",
        trim_base(base_url),
        station_id,
        urlencoding::encode(api_key),
        from_ts,
        to_ts
    )
}

pub fn build_daily_summary_url(base_url: &str, api_key: &str, station_id: i64) -> String {
    format!(
        "{}/dailysummary.php/{}?key={}",
        trim_base(base_url),
        station_id,
        urlencoding::encode(api_key)
    )
}

// ---------------------------------------------------------------------------
// Response validation
// ---------------------------------------------------------------------------

/// Maps a non-success HTTP status onto the client error taxonomy.
///
/// 401 and 404 get their own variants regardless of the body; every other
/// error status is a transport error carrying the status.
pub fn check_status(status: u16, body: &str) -> Result<(), VwError> {
    if (200..300).contains(&status) {
        return Ok(());
    }

    log::error!("VitalWeather API returned HTTP {}. Response body: {}", status, body);

    match status {
        401 => Err(VwError::Unauthorized {
            message: "Unauthorized access".to_string(),
        }),
        404 => Err(VwError::NotFound {
            message: "User not found".to_string(),
        }),
        _ => Err(VwError::Transport {
            status: Some(status),
            message: format!("HTTP error: {}", status),
        }),
    }
}

fn is_empty_body(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Parses a response envelope body.
///
/// # Errors
/// - `VwError::Api`: the body's `code` is not 200.
/// - `VwError::Parse`: not JSON, no `code`, or a payload of the wrong shape.
///
/// An empty body (blank, `null`, `{}` or `[]`) is `Fetched::NoData`.
pub fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Fetched<T>, VwError> {
    if body.trim().is_empty() {
        return Ok(Fetched::NoData { raw: body.to_string() });
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| VwError::Parse(format!("JSON deserialization failed: {}", e)))?;

    if is_empty_body(&value) {
        return Ok(Fetched::NoData { raw: body.to_string() });
    }

    let code = value
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| VwError::Parse("response envelope has no numeric 'code'".to_string()))?;

    if code != API_CODE_OK {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(VwError::Api { code, message });
    }

    serde_json::from_value(value)
        .map(Fetched::Data)
        .map_err(|e| VwError::Parse(format!("unexpected response shape: {}", e)))
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

/// The four VitalWeather operations the action handlers depend on.
pub trait WeatherApi: Send + Sync {
    fn fetch_stations(
        &self,
        base_url: &str,
        api_key: &str,
    ) -> Result<Fetched<StationsResponse>, VwError>;

    fn fetch_latest_conditions(
        &self,
        base_url: &str,
        api_key: &str,
        station_id: i64,
    ) -> Result<Fetched<ConditionsResponse>, VwError>;

    fn fetch_history(
        &self,
        base_url: &str,
        api_key: &str,
        station_id: i64,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Fetched<HistoryResponse>, VwError>;

    fn fetch_daily_summary(
        &self,
        base_url: &str,
        api_key: &str,
        station_id: i64,
    ) -> Result<Fetched<DailySummaryResponse>, VwError>;
}

impl From<reqwest::Error> for VwError {
    fn from(e: reqwest::Error) -> Self {
        VwError::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Blocking HTTP implementation of `WeatherApi`.
pub struct VitalWeatherClient {
    http: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl VitalWeatherClient {
    /// Client with a 120 s timeout and the default retry policy.
    pub fn new() -> Result<Self, VwError> {
        Self::with_retry_policy(RetryPolicy::default())
    }

    pub fn with_retry_policy(retry: RetryPolicy) -> Result<Self, VwError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http, retry })
    }

    fn get<T: DeserializeOwned>(&self, url: &str) -> Result<Fetched<T>, VwError> {
        self.retry.run(|| self.get_once(url), VwError::is_transient)
    }

    fn get_once<T: DeserializeOwned>(&self, url: &str) -> Result<Fetched<T>, VwError> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;

        check_status(status, &body)?;
        parse_envelope(&body)
    }
}

impl WeatherApi for VitalWeatherClient {
    fn fetch_stations(
        &self,
        base_url: &str,
        api_key: &str,
    ) -> Result<Fetched<StationsResponse>, VwError> {
        log::info!("-- Getting stations from {} --", base_url);
        self.get(&build_stations_url(base_url, api_key))
    }

    fn fetch_latest_conditions(
        &self,
        base_url: &str,
        api_key: &str,
        station_id: i64,
    ) -> Result<Fetched<ConditionsResponse>, VwError> {
        log::info!("-- Getting latest conditions for station {} --", station_id);
        self.get(&build_conditions_url(base_url, api_key, station_id))
    }

    fn fetch_history(
        &self,
        base_url: &str,
        api_key: &str,
        station_id: i64,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Fetched<HistoryResponse>, VwError> {
        log::info!(
            "-- Getting history for station {} from {} to {} --",
            station_id,
            from_ts,
            to_ts
        );
        self.get(&build_history_url(base_url, api_key, station_id, from_ts, to_ts))
    }

    fn fetch_daily_summary(
        &self,
        base_url: &str,
        api_key: &str,
        station_id: i64,
    ) -> Result<Fetched<DailySummaryResponse>, VwError> {
        log::info!("-- Getting daily summary for station {} --", station_id);
        self.get(&build_daily_summary_url(base_url, api_key, station_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Downstream ingestion client.
///
/// Canonical observations and events are POSTed as JSON arrays to the
/// ingestion service:
///   POST {base_url}/v2/observations/
///   POST {base_url}/v2/events/
///
/// The response body lists the records the service accepted. That list,
/// not the number of records we produced, is what handlers report.

use crate::model::{Event, Observation};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Records per ingestion request.
pub const OBSERVATION_BATCH_SIZE: usize = 200;

const INGESTION_TIMEOUT_SECS: u64 = 120;

/// Splits records into consecutive batches of at most `size` items.
pub fn generate_batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("ingestion request failed: {0}")]
    Transport(String),
    #[error("ingestion service rejected batch with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("unexpected ingestion response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        SendError::Transport(e.to_string())
    }
}

/// Where handlers deliver canonical records.
pub trait EventSink: Send + Sync {
    /// Returns the records the downstream service accepted.
    fn send_observations(
        &self,
        records: &[Observation],
        integration_id: &str,
    ) -> Result<Vec<Value>, SendError>;

    fn send_events(&self, records: &[Event], integration_id: &str) -> Result<Vec<Value>, SendError>;
}

/// Reads the accepted-record list out of an ingestion response body.
///
/// Accepts a bare array, or an object wrapping the array in `data`.
pub fn accepted_records(body: &str) -> Result<Vec<Value>, SendError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| SendError::Parse(format!("JSON deserialization failed: {}", e)))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Ok(vec![other]),
            None => Ok(vec![Value::Object(map)]),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(SendError::Parse(format!("expected a list of records, got {}", other))),
    }
}

/// HTTP implementation of `EventSink`.
pub struct IngestionClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl IngestionClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, SendError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(INGESTION_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn post<T: Serialize>(
        &self,
        path: &str,
        records: &[T],
        integration_id: &str,
    ) -> Result<Vec<Value>, SendError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("x-integration-id", integration_id)
            .json(records)
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            log::error!("Ingestion POST {} returned HTTP {}: {}", path, status.as_u16(), body);
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        accepted_records(&body)
    }
}

impl EventSink for IngestionClient {
    fn send_observations(
        &self,
        records: &[Observation],
        integration_id: &str,
    ) -> Result<Vec<Value>, SendError> {
        self.post("v2/observations/", records, integration_id)
    }

    fn send_events(&self, records: &[Event], integration_id: &str) -> Result<Vec<Value>, SendError> {
        self.post("v2/events/", records, integration_id)
    }
}

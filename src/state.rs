/// Per-station integration state and the history watermark built on it.
///
/// State is a JSON document keyed by (integration, action, source). The only
/// document this service writes is the history watermark:
///
///   { "updated_at": <epoch seconds of the newest ingested reading> }
///
/// Three backends implement `StateStore`:
/// - `MemoryStateStore`: process lifetime only (tests, one-shot runs)
/// - `FileStateStore`: a single JSON file, rewritten atomically
/// - `PostgresStateStore`: `vitalweather.integration_state` table
///
/// Access is read-then-fetch-then-write with no transaction spanning the
/// fetch. A crash between forwarding data and committing the watermark
/// re-delivers that window on the next run; it never skips data.

use crate::db;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Keys, documents and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub integration_id: String,
    pub action_id: String,
    pub source_id: String,
}

impl StateKey {
    pub fn new(integration_id: &str, action_id: &str, source_id: &str) -> Self {
        Self {
            integration_id: integration_id.to_string(),
            action_id: action_id.to_string(),
            source_id: source_id.to_string(),
        }
    }

    /// Flat key used by the file and memory backends.
    pub fn storage_key(&self) -> String {
        format!(
            "integration_state.{}.{}.{}",
            self.integration_id, self.action_id, self.source_id
        )
    }
}

/// Watermark document stored per station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file error: {0}")]
    Io(String),
    #[error("state document error: {0}")]
    Serde(String),
    #[error("state database error: {0}")]
    Database(String),
}

impl From<std::io::Error> for StateError {
    fn from(e: std::io::Error) -> Self {
        StateError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Serde(e.to_string())
    }
}

impl From<postgres::Error> for StateError {
    fn from(e: postgres::Error) -> Self {
        StateError::Database(e.to_string())
    }
}

/// Composite-key document store.
pub trait StateStore: Send + Sync {
    fn get_state(&self, key: &StateKey) -> Result<Option<Value>, StateError>;
    fn set_state(&self, key: &StateKey, state: &Value) -> Result<(), StateError>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get_state(&self, key: &StateKey) -> Result<Option<Value>, StateError> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        Ok(states.get(&key.storage_key()).cloned())
    }

    fn set_state(&self, key: &StateKey, state: &Value) -> Result<(), StateError> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(key.storage_key(), state.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// All state in one JSON object on disk. Writes go to a sibling temp file
/// and are renamed over the original.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, Value>, StateError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, states: &HashMap<String, Value>) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(states)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get_state(&self, key: &StateKey) -> Result<Option<Value>, StateError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.remove(&key.storage_key()))
    }

    fn set_state(&self, key: &StateKey, state: &Value) -> Result<(), StateError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut states = self.load()?;
        states.insert(key.storage_key(), state.clone());
        self.save(&states)
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL backend
// ---------------------------------------------------------------------------

/// Schema holding `integration_state` (see `sql/001_integration_state.sql`).
pub const STATE_SCHEMA: &str = "vitalweather";

pub struct PostgresStateStore {
    client: Mutex<postgres::Client>,
}

impl PostgresStateStore {
    /// Connects via `DATABASE_URL` and verifies the state schema.
    pub fn connect() -> Result<Self, db::DbConfigError> {
        let client = db::connect_and_verify(&[STATE_SCHEMA])?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: postgres::Client) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }
}

impl StateStore for PostgresStateStore {
    fn get_state(&self, key: &StateKey) -> Result<Option<Value>, StateError> {
        let mut client = self.client.lock().unwrap_or_else(|e| e.into_inner());
        let rows = client.query(
            "SELECT state FROM vitalweather.integration_state
             WHERE integration_id = $1 AND action_id = $2 AND source_id = $3",
            &[&key.integration_id, &key.action_id, &key.source_id],
        )?;

        match rows.first() {
            Some(row) => {
                let raw: String = row.get(0);
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    fn set_state(&self, key: &StateKey, state: &Value) -> Result<(), StateError> {
        let raw = serde_json::to_string(state)?;
        let mut client = self.client.lock().unwrap_or_else(|e| e.into_inner());
        client.execute(
            "INSERT INTO vitalweather.integration_state
             (integration_id, action_id, source_id, state, modified_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (integration_id, action_id, source_id) DO UPDATE SET
                state = EXCLUDED.state,
                modified_at = EXCLUDED.modified_at",
            &[
                &key.integration_id,
                &key.action_id,
                &key.source_id,
                &raw,
                &Utc::now(),
            ],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Watermarks
// ---------------------------------------------------------------------------

/// Start of the history window: the stored watermark, or `lookback_days`
/// before `now` when the station has never been pulled.
pub fn window_start(watermark: Option<i64>, now: DateTime<Utc>, lookback_days: u32) -> i64 {
    watermark.unwrap_or_else(|| (now - Duration::days(i64::from(lookback_days))).timestamp())
}

/// History watermarks on top of any `StateStore`.
#[derive(Clone)]
pub struct WatermarkStore {
    store: Arc<dyn StateStore>,
}

impl WatermarkStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    fn key(integration_id: &str, action_id: &str, station_id: i64) -> StateKey {
        StateKey::new(integration_id, action_id, &station_id.to_string())
    }

    /// Stored watermark in epoch seconds, if any.
    pub fn load(
        &self,
        integration_id: &str,
        action_id: &str,
        station_id: i64,
    ) -> Result<Option<i64>, StateError> {
        let key = Self::key(integration_id, action_id, station_id);
        match self.store.get_state(&key)? {
            Some(doc) => {
                let state: IntegrationState = serde_json::from_value(doc)?;
                Ok(state.updated_at)
            }
            None => Ok(None),
        }
    }

    /// Overwrites the watermark. Regressions are not rejected.
    pub fn commit(
        &self,
        integration_id: &str,
        action_id: &str,
        station_id: i64,
        updated_at: i64,
    ) -> Result<(), StateError> {
        let key = Self::key(integration_id, action_id, station_id);
        let doc = serde_json::to_value(IntegrationState {
            updated_at: Some(updated_at),
        })?;
        self.store.set_state(&key, &doc)
    }
}

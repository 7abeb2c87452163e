/// vitalweather_service: VitalWeather weather-station connector.
///
/// Pulls station readings and daily summaries from the VitalWeather API and
/// forwards them to the ingestion service as observations and events.
///
/// # Module structure
///
/// ```text
/// vitalweather_service
/// ├── model       — wire types, canonical records, VwError
/// ├── config      — service configuration loader (vitalweather.toml)
/// ├── retry       — exponential backoff with jitter
/// ├── ingest
/// │   ├── vitalweather — VitalWeather API: URL construction, envelope parsing, client
/// │   └── fixtures (test only) — representative API response payloads
/// ├── transform   — unit decoration, readings -> observations, summaries -> events
/// ├── state       — composite-key state stores and history watermarks
/// ├── db          — PostgreSQL connection and schema validation
/// ├── sender      — batching and the ingestion HTTP client
/// ├── scheduler   — action requests, the work queue, daily schedule
/// ├── actions
/// │   ├── configurations — typed per-action settings
/// │   ├── handlers       — auth, pull_observations, station pulls, daily summary
/// │   └── runner         — dispatches action requests to handlers
/// ├── endpoint    — HTTP API for executing actions (direct and Pub/Sub push)
/// └── daemon      — poll loop, daily schedule, worker pool
/// ```

/// Public modules
pub mod actions;
pub mod config;
pub mod daemon;
pub mod db;
pub mod endpoint;
pub mod ingest;
pub mod model;
pub mod retry;
pub mod scheduler;
pub mod sender;
pub mod state;
pub mod transform;

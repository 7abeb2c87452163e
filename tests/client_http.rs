/// Integration tests for the VitalWeather and ingestion HTTP clients
///
/// Each test scripts a local tiny_http server and drives the real blocking
/// clients against it, so status handling, retries and envelope parsing are
/// exercised over an actual socket.
///
/// Run with: cargo test --test client_http

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{ok, status, MockServer, DAILY_SUMMARY_JSON, HISTORY_JSON, INCORRECT_KEY_JSON, STATIONS_JSON};
use vitalweather_service::ingest::vitalweather::{VitalWeatherClient, WeatherApi};
use vitalweather_service::model::{Event, Fetched, Location, VwError};
use vitalweather_service::retry::RetryPolicy;
use vitalweather_service::sender::{EventSink, IngestionClient, SendError};

fn client(attempts: u32) -> VitalWeatherClient {
    VitalWeatherClient::with_retry_policy(RetryPolicy::immediate(attempts)).expect("build client")
}

// ---------------------------------------------------------------------------
// VitalWeather client
// ---------------------------------------------------------------------------

#[test]
fn test_fetch_stations_over_http() {
    let server = MockServer::start(vec![ok(STATIONS_JSON)]);

    let response = client(3).fetch_stations(&server.base_url, "test key").unwrap();
    let stations = response.into_data().expect("stations payload");
    assert_eq!(stations.stations.len(), 1);
    assert_eq!(stations.stations[0].id, 123);
    assert_eq!(stations.generated_at.timestamp(), 1739811533);

    let requests = server.finish();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "/stations.php?key=test%20key");
}

#[test]
fn test_unauthorized_is_not_retried() {
    let server = MockServer::start(vec![status(401, r#"{"detail": "nope"}"#)]);

    let result = client(5).fetch_stations(&server.base_url, "bad");
    assert_eq!(
        result.unwrap_err(),
        VwError::Unauthorized { message: "Unauthorized access".to_string() }
    );
    assert_eq!(server.finish().len(), 1);
}

#[test]
fn test_not_found() {
    let server = MockServer::start(vec![status(404, "")]);

    let result = client(5).fetch_latest_conditions(&server.base_url, "key", 999);
    let err = result.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(err.message(), "User not found");

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "/conditions.php/999?key=key");
}

#[test]
fn test_server_error_is_retried_until_success() {
    let server = MockServer::start(vec![status(500, "oops"), status(502, "oops"), ok(STATIONS_JSON)]);

    let response = client(5).fetch_stations(&server.base_url, "key").unwrap();
    assert!(!response.is_no_data());
    assert_eq!(server.finish().len(), 3);
}

#[test]
fn test_server_error_exhausts_attempts() {
    let server = MockServer::start(vec![status(503, ""), status(503, ""), status(503, "")]);

    let result = client(3).fetch_stations(&server.base_url, "key");
    assert!(matches!(result, Err(VwError::Transport { status: Some(503), .. })));
    assert_eq!(server.finish().len(), 3);
}

#[test]
fn test_application_error_on_http_200() {
    let server = MockServer::start(vec![ok(INCORRECT_KEY_JSON)]);

    let result = client(5).fetch_stations(&server.base_url, "wrong");
    assert_eq!(
        result.unwrap_err(),
        VwError::Api { code: 400, message: "Incorrect KEY".to_string() }
    );
    assert_eq!(server.finish().len(), 1);
}

#[test]
fn test_empty_body_is_no_data() {
    let server = MockServer::start(vec![ok(""), ok("{}")]);
    let client = client(1);

    assert!(client.fetch_stations(&server.base_url, "key").unwrap().is_no_data());
    assert!(matches!(
        client.fetch_daily_summary(&server.base_url, "key", 123),
        Ok(Fetched::NoData { .. })
    ));
    server.finish();
}

#[test]
fn test_history_window_in_query() {
    let server = MockServer::start(vec![ok(HISTORY_JSON)]);
    let to = Utc.with_ymd_and_hms(2025, 3, 6, 16, 0, 0).unwrap();
    let from = to - Duration::days(15);

    let history = client(1)
        .fetch_history(&server.base_url, "key", 123, from.timestamp(), to.timestamp())
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(history.history.len(), 2);

    let requests = server.finish();
    assert_eq!(
        requests[0].url,
        format!("/history.php?ID=123&key=key&from={}&to={}", from.timestamp(), to.timestamp())
    );
}

#[test]
fn test_daily_summary_over_http() {
    let server = MockServer::start(vec![ok(DAILY_SUMMARY_JSON)]);

    let summary = client(1)
        .fetch_daily_summary(&server.base_url, "key", 123)
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(summary.summaries[0].avg_temp, 21.6);
    assert_eq!(server.finish()[0].url, "/dailysummary.php/123?key=key");
}

// ---------------------------------------------------------------------------
// Ingestion client
// ---------------------------------------------------------------------------

fn sample_event() -> Event {
    Event {
        title: "Test Station daily summary".to_string(),
        event_type: "weather_station_summary".to_string(),
        recorded_at: Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap(),
        location: Location { lat: -15.92883055, lon: 34.606880555 },
        event_details: serde_json::Map::new(),
    }
}

#[test]
fn test_ingestion_post_headers_and_accepted_count() {
    let server = MockServer::start(vec![ok(r#"[{"object_id": "a"}, {"object_id": "b"}]"#)]);
    let sink = IngestionClient::new(&server.base_url, "ingest-key").unwrap();

    let accepted = sink.send_events(&[sample_event(), sample_event()], "int-1").unwrap();
    assert_eq!(accepted.len(), 2);

    let requests = server.finish();
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "/v2/events/");
    assert_eq!(request.header("Authorization"), Some("Bearer ingest-key"));
    assert_eq!(request.header("x-integration-id"), Some("int-1"));

    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["recorded_at"], "2025-03-03T00:00:00Z");
}

#[test]
fn test_ingestion_rejection() {
    let server = MockServer::start(vec![status(422, r#"{"detail": "bad location"}"#)]);
    let sink = IngestionClient::new(&server.base_url, "ingest-key").unwrap();

    let result = sink.send_events(&[sample_event()], "int-1");
    match result {
        Err(SendError::Rejected { status, body }) => {
            assert_eq!(status, 422);
            assert!(body.contains("bad location"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
    server.finish();
}

//! Shared helpers for integration tests: a scripted local HTTP server and
//! VitalWeather payloads.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// A request the mock server received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Answers with `responses` in order, one per request, then shuts down.
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind mock server");
        let addr = server.server_addr().to_ip().expect("mock server has an IP address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            for (status, body) in responses {
                let mut request = match server.recv() {
                    Ok(request) => request,
                    Err(_) => return,
                };
                let mut received = String::new();
                let _ = request.as_reader().read_to_string(&mut received);
                recorded.lock().unwrap().push(Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    body: received,
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.to_string()))
                        .collect(),
                });

                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .unwrap(),
                    );
                let _ = request.respond(response);
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits until every scripted response has been served.
    pub fn finish(mut self) -> Vec<Recorded> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("mock server thread panicked");
        }
        self.requests()
    }
}

pub fn ok(body: &str) -> (u16, String) {
    (200, body.to_string())
}

pub fn status(code: u16, body: &str) -> (u16, String) {
    (code, body.to_string())
}

pub const STATIONS_JSON: &str = r#"{
  "stations": [
    {"Station_ID": 123, "Station_Name": "Test Station", "latitude": -15.92883055, "longitude": 34.606880555, "height": 166.6}
  ],
  "generated_at": 1739811533,
  "code": 200,
  "message": "success"
}"#;

pub const INCORRECT_KEY_JSON: &str = r#"{
  "generated_at": "2025-02-17 16:58:53",
  "code": 400,
  "message": "Incorrect KEY"
}"#;

pub const HISTORY_JSON: &str = r#"{
  "History": [
    {"ts": "2025-03-06 15:00:00", "pressure": 995.1, "temperature": 26.1, "humidity": 85, "wind_min": 1,
     "wind_average": 2.4, "wind_max": 5.0, "wind_direction": 200, "total_rain": 0.2, "uv": 6.0, "solar_radiation": 410.0},
    {"ts": "2025-03-06 14:00:00", "pressure": 995.4, "temperature": 25.2, "humidity": 89, "wind_min": 0,
     "wind_average": 1.1, "wind_max": 2.9, "wind_direction": 190, "total_rain": 0.0, "uv": 4.5, "solar_radiation": 300.5}
  ],
  "unites": {"ts": "", "temperature": "°C", "humidity": "%", "pressure": "mb", "total_rain": "mm"},
  "generated_at": 1741273200,
  "code": 200,
  "message": "success"
}"#;

pub const DAILY_SUMMARY_JSON: &str = r#"{
  "dailysummary": [
    {"station_id": 123, "Date": "2025-03-03", "rain": 58.8, "avg_temp": 21.6, "min_temp": 20.6, "max_temp": 22.8,
     "avg_RH": 94, "min_RH": 92, "max_RH": 95, "avg_wind": 0.1, "avg_solar": 0, "avg_pressure": 1003.71,
     "min_pressure": 1002.51, "max_pressure": 1005.28, "avg_winddirection": [225, "SW"]}
  ],
  "unites": {"avg_temp": "°C", "avg_winddirection": ["°", "DIR"]},
  "generated_at": 1747242490,
  "code": 200,
  "message": "success"
}"#;

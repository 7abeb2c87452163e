/// HTTP endpoint for executing actions
///
/// Lets the platform (or an operator with curl) run any action on demand,
/// either directly or through a Pub/Sub push subscription.
///
/// Endpoints:
/// - GET /health - Service health check
/// - POST /v1/actions/execute - Body is an `ActionRequest`
/// - POST /push - Pub/Sub push envelope whose `message.data` is a base64 `ActionRequest`

use crate::actions::runner::ActionRunner;
use crate::actions::ActionError;
use crate::scheduler::ActionRequest;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tiny_http::Method;

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Pub/Sub push delivery
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PushMessage {
    /// Base64-encoded JSON `ActionRequest`
    pub data: String,
    #[serde(default, rename = "messageId", alias = "message_id")]
    pub message_id: Option<String>,
}

/// Extracts the action request carried by a push envelope.
pub fn decode_push_envelope(body: &str) -> Result<ActionRequest, String> {
    let envelope: PushEnvelope =
        serde_json::from_str(body).map_err(|e| format!("Invalid push envelope: {}", e))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(envelope.message.data.trim())
        .map_err(|e| format!("message.data is not valid base64: {}", e))?;

    serde_json::from_slice(&bytes).map_err(|e| format!("message.data is not an action request: {}", e))
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Routes one request; returns the status code and JSON body.
pub fn route(runner: &ActionRunner, method: &Method, url: &str, body: &str) -> (u16, Value) {
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        (Method::Get, "/health") => handle_health(runner),
        (Method::Post, "/v1/actions/execute") => match serde_json::from_str::<ActionRequest>(body) {
            Ok(request) => handle_execute(runner, &request),
            Err(e) => (400, json!({"error": format!("Invalid action request: {}", e)})),
        },
        (Method::Post, "/push") => match decode_push_envelope(body) {
            Ok(request) => handle_execute(runner, &request),
            Err(e) => (400, json!({"error": e})),
        },
        _ => (
            404,
            json!({
                "error": "Not found",
                "available_endpoints": ["GET /health", "POST /v1/actions/execute", "POST /push"]
            }),
        ),
    }
}

fn handle_health(runner: &ActionRunner) -> (u16, Value) {
    (
        200,
        json!({
            "status": "ok",
            "service": "vitalweather_service",
            "version": env!("CARGO_PKG_VERSION"),
            "integrations": runner.integration_ids(),
        }),
    )
}

fn handle_execute(runner: &ActionRunner, request: &ActionRequest) -> (u16, Value) {
    log::info!(
        "Endpoint executing '{}' for integration {}",
        request.action_id,
        request.integration_id
    );

    match runner.execute(request) {
        Ok(result) => (200, result),
        Err(e) => {
            log::error!(
                "Action '{}' for integration {} failed: {}",
                request.action_id,
                request.integration_id,
                e
            );
            (e.http_status(), error_body(&e))
        }
    }
}

fn error_body(error: &ActionError) -> Value {
    match error {
        ActionError::Client(e) => json!({"error": e.message(), "status_code": e.status_code()}),
        other => json!({"error": other.to_string()}),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port
pub fn start_endpoint_server(port: u16, runner: Arc<ActionRunner>) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    log::info!("HTTP endpoint listening on http://0.0.0.0:{}", port);
    serve(&server, &runner);
    Ok(())
}

/// Answers requests until the server is dropped.
pub fn serve(server: &tiny_http::Server, runner: &ActionRunner) {
    for mut request in server.incoming_requests() {
        let mut body = String::new();
        let (status, json) = match request.as_reader().read_to_string(&mut body) {
            Ok(_) => route(runner, request.method(), request.url(), &body),
            Err(e) => (400, json!({"error": format!("Unreadable request body: {}", e)})),
        };

        if let Err(e) = request.respond(create_response(status, json)) {
            log::warn!("Failed to send response: {}", e);
        }
    }
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string());
    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! HTTP handlers for the command surface.
//!
//! Every failure is a JSON body `{ok: false, error}` with a matching status
//! code; callers never get an empty response.

use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tabrelay_core::constants::MAX_EXECUTE_RETRIES;
use tabrelay_core::{Outcome, RelayError};

use super::surface::Poll;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::relay::notifications::Notification;
use crate::server::AppState;

/// `POST /run` body.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// JavaScript to evaluate in the page.
    pub code: String,
    /// Per-request timeout override.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// `POST /execute` body.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// JavaScript to evaluate in the page.
    pub code: String,
    /// Per-attempt timeout override.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Extra attempts after a timeout.
    #[serde(default)]
    pub retries: Option<u32>,
}

/// `GET /result` query.
#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    /// Id returned by `POST /run`.
    pub request_id: String,
}

/// `POST /reinit-control` body.
#[derive(Debug, Deserialize)]
pub struct ReinitControlRequest {
    /// Overrides merged over the configured defaults.
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Serialize)]
struct NotificationsResponse {
    ok: bool,
    notifications: Vec<Notification>,
}

/// Command surface routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/run", post(run_handler))
        .route("/execute", post(execute_handler))
        .route("/result", get(result_handler))
        .route("/health", get(health_handler))
        .route("/notifications", get(notifications_handler))
        .route("/reinit-control", post(reinit_control_handler))
        .route("/metrics", get(metrics_handler))
}

/// POST /run
async fn run_handler(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    let timeout = match parse_timeout(request.timeout_ms) {
        Ok(timeout) => timeout,
        Err(response) => return response,
    };
    if request.code.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "code must not be empty");
    }

    match state.surface.submit_code(&request.code, timeout) {
        Ok(request_id) => Json(json!({ "ok": true, "request_id": request_id })).into_response(),
        Err(error) => relay_error_response(&error),
    }
}

/// POST /execute
async fn execute_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    let timeout = match parse_timeout(request.timeout_ms) {
        Ok(timeout) => timeout,
        Err(response) => return response,
    };
    if request.code.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "code must not be empty");
    }

    let retries = request.retries.unwrap_or(state.config.execute_retries);
    if retries > MAX_EXECUTE_RETRIES {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("retries must be at most {MAX_EXECUTE_RETRIES}"),
        );
    }
    let outcome = state
        .surface
        .execute_with_retry(&request.code, timeout, retries.saturating_add(1))
        .await;
    (outcome_status(&outcome), Json(outcome.to_json())).into_response()
}

/// GET /result?request_id=
async fn result_handler(
    State(state): State<AppState>,
    query: Result<Query<ResultQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };

    match state.surface.poll_result(&query.request_id) {
        Poll::Pending => Json(json!({
            "ok": false,
            "status": "pending",
            "request_id": query.request_id,
        }))
        .into_response(),
        Poll::Done(outcome) => {
            let mut body = outcome.to_json();
            body["request_id"] = json!(query.request_id);
            Json(body).into_response()
        }
        Poll::Unknown => error_response(
            StatusCode::NOT_FOUND,
            format!("unknown request_id `{}`", query.request_id),
        ),
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.surface.health()))
}

/// GET /notifications
async fn notifications_handler(State(state): State<AppState>) -> Response {
    Json(NotificationsResponse {
        ok: true,
        notifications: state.surface.drain_notifications(),
    })
    .into_response()
}

/// POST /reinit-control
async fn reinit_control_handler(
    State(state): State<AppState>,
    payload: Result<Json<ReinitControlRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    let config = request.config.unwrap_or_else(|| json!({}));

    match state.surface.reinit_control(config) {
        Ok(request_id) => Json(json!({ "ok": true, "request_id": request_id })).into_response(),
        Err(error) => relay_error_response(&error),
    }
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics::render(handle),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "metrics recorder not installed"),
    }
}

fn parse_timeout(timeout_ms: Option<u64>) -> Result<Option<Duration>, Response> {
    match timeout_ms {
        Some(0) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "timeout_ms must be greater than zero",
        )),
        other => Ok(other.map(Duration::from_millis)),
    }
}

fn outcome_status(outcome: &Outcome) -> StatusCode {
    match outcome {
        Outcome::Ok { .. } | Outcome::JsError { .. } => StatusCode::OK,
        Outcome::Timeout => StatusCode::GATEWAY_TIMEOUT,
        Outcome::ConnectionLost => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn relay_error_response(error: &RelayError) -> Response {
    let status = match error {
        RelayError::NotConnected | RelayError::SendQueueFull => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::InvalidControlConfig(_) | RelayError::Decode(_) => StatusCode::BAD_REQUEST,
    };
    error_response(status, error.to_string())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message: String = message.into();
    (status, Json(json!({ "ok": false, "error": message }))).into_response()
}

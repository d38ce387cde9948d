//! REST API routes and handlers
//!
//! Read endpoints serve whatever snapshot is stored; they never trigger
//! ingestion. `/update` runs an ingestion cycle and reports its outcome in
//! the body with HTTP 200 either way, so polling clients distinguish
//! outcomes by the `status` field rather than by status code. Invalid
//! caller input maps to 400; a valid queue/date with nothing stored is a
//! legitimate `unknown` answer, not an error.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::Error;
use crate::models::{QueueId, QueueStatus, TimeInterval};

use super::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Service info served at the root
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Error body for 400/500 responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

/// Health check response
///
/// Timestamps are rendered in the utility's civil timezone, never UTC.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub last_scrape: Option<DateTime<Tz>>,
    pub available_dates: Vec<NaiveDate>,
    pub total_queues: usize,
}

/// Outcome of a triggered ingestion cycle
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<NaiveDate>>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Tz>>,
}

/// Per-queue schedule for one date
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub queue: QueueId,
    pub date: NaiveDate,
    pub status: QueueStatus,
    pub intervals: Vec<TimeInterval>,
    pub operational_message: Option<String>,
    pub last_updated: Option<DateTime<Tz>>,
    pub total_hours_off: f64,
}

/// One queue's slice of the all-queues response
#[derive(Debug, Serialize)]
pub struct QueueDay {
    pub status: QueueStatus,
    pub intervals: Vec<TimeInterval>,
    pub total_hours_off: f64,
}

/// All queues for one date
#[derive(Debug, Serialize)]
pub struct AllSchedulesResponse {
    pub date: NaiveDate,
    pub last_updated: Option<DateTime<Tz>>,
    pub operational_message: Option<String>,
    pub queues: BTreeMap<String, QueueDay>,
}

/// Known dates response
#[derive(Debug, Serialize)]
pub struct DatesResponse {
    pub dates: Vec<NaiveDate>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/update", get(update))
        .route("/schedule/{queue}", get(schedule_today))
        .route("/schedule/{queue}/{day}", get(schedule_by_date))
        .route("/all", get(all_today))
        .route("/all/{day}", get(all_by_date))
        .route("/dates", get(dates))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn root() -> impl IntoResponse {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status(State(state): State<AppState>) -> axum::response::Response {
    match state.service.health() {
        Ok(health) => Json(StatusResponse {
            status: "healthy",
            last_scrape: health.last_scrape.map(|at| state.service.to_civil(at)),
            available_dates: health.available_dates,
            total_queues: health.total_queues,
        })
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

/// Trigger an ingestion cycle; the outcome travels in the body
async fn update(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.trigger_update().await {
        Ok(report) => {
            let message = if report.unchanged {
                String::from("Дані не змінилися")
            } else {
                format!("Оновлено графіки для {} дат", report.dates.len())
            };
            // The cycle itself succeeded; a failed freshness read only
            // costs the timestamp field.
            let last_updated = match state.service.last_scrape() {
                Ok(at) => at.map(|at| state.service.to_civil(at)),
                Err(e) => {
                    warn!(error = %e, "could not read last-scrape after update");
                    None
                }
            };
            Json(UpdateResponse {
                status: "success",
                dates: Some(report.dates),
                message,
                last_updated,
            })
        }
        Err(e) => {
            error!(error = %e, "triggered ingestion failed");
            Json(UpdateResponse {
                status: "error",
                dates: None,
                message: e.to_string(),
                last_updated: None,
            })
        }
    }
}

async fn schedule_today(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> axum::response::Response {
    let queue = match parse_queue(&queue) {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    schedule_response(&state, queue, state.service.today())
}

async fn schedule_by_date(
    State(state): State<AppState>,
    Path((queue, day)): Path<(String, String)>,
) -> axum::response::Response {
    let queue = match parse_queue(&queue) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let date = match parse_date(&day) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    schedule_response(&state, queue, date)
}

async fn all_today(State(state): State<AppState>) -> axum::response::Response {
    all_response(&state, state.service.today())
}

async fn all_by_date(
    State(state): State<AppState>,
    Path(day): Path<String>,
) -> axum::response::Response {
    let date = match parse_date(&day) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    all_response(&state, date)
}

async fn dates(State(state): State<AppState>) -> axum::response::Response {
    match state.service.available_dates() {
        Ok(dates) => Json(DatesResponse { dates }).into_response(),
        Err(e) => internal_error(&e),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_queue(raw: &str) -> Result<QueueId, axum::response::Response> {
    raw.parse().map_err(|e: Error| bad_request(&e))
}

fn parse_date(raw: &str) -> Result<NaiveDate, axum::response::Response> {
    // Strictly YYYY-MM-DD, matching what the store uses as keys.
    if raw.len() != 10 {
        return Err(bad_request(&Error::InvalidDate(raw.to_string())));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| bad_request(&Error::InvalidDate(raw.to_string())))
}

fn bad_request(err: &Error) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(err.to_string()))).into_response()
}

fn internal_error(err: &Error) -> axum::response::Response {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(err.to_string())),
    )
        .into_response()
}

/// Build the per-queue response; a missing entry is served as `unknown`
fn schedule_response(state: &AppState, queue: QueueId, date: NaiveDate) -> axum::response::Response {
    let entry = match state.service.entry(queue, date) {
        Ok(entry) => entry,
        Err(e) => return internal_error(&e),
    };

    let response = match entry {
        Some(entry) => ScheduleResponse {
            queue,
            date,
            status: state.service.status_of(&entry),
            total_hours_off: state.service.hours_off(&entry),
            intervals: entry.intervals,
            operational_message: entry.message,
            last_updated: entry.last_updated.map(|at| state.service.to_civil(at)),
        },
        None => {
            let (message, last_scrape) =
                match (state.service.message(date), state.service.last_scrape()) {
                    (Ok(message), Ok(last_scrape)) => (message, last_scrape),
                    (Err(e), _) | (_, Err(e)) => return internal_error(&e),
                };

            ScheduleResponse {
                queue,
                date,
                status: QueueStatus::Unknown,
                intervals: Vec::new(),
                operational_message: message,
                last_updated: last_scrape.map(|at| state.service.to_civil(at)),
                total_hours_off: 0.0,
            }
        }
    };

    Json(response).into_response()
}

fn all_response(state: &AppState, date: NaiveDate) -> axum::response::Response {
    let entries = match state.service.entries_for_date(date) {
        Ok(entries) => entries,
        Err(e) => return internal_error(&e),
    };

    let mut queues = BTreeMap::new();
    for entry in entries {
        queues.insert(
            entry.queue.to_string(),
            QueueDay {
                status: state.service.status_of(&entry),
                total_hours_off: state.service.hours_off(&entry),
                intervals: entry.intervals,
            },
        );
    }

    let (message, last_updated) = match (state.service.message(date), state.service.last_scrape()) {
        (Ok(message), Ok(last_updated)) => (message, last_updated),
        (Err(e), _) | (_, Err(e)) => return internal_error(&e),
    };

    Json(AllSchedulesResponse {
        date,
        last_updated: last_updated.map(|at| state.service.to_civil(at)),
        operational_message: message,
        queues,
    })
    .into_response()
}

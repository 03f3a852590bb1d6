//! HTTP request handlers.

use super::AppState;
use crate::badge::{self, BadgeOptions, BadgeValues};
use crate::db::{DbError, ReportFilter, Status};
use crate::duration::{normalize_duration, parse_duration};
use crate::error::Error;
use crate::pipeline::Beat;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_BADGE_DURATION: &str = "24h";
/// Longest window an average response badge may cover.
const MAX_AVG_RESPONSE_HOURS: u64 = 720;
const DEFAULT_REPORT_LIMIT: u32 = 10;

// ============================================================================
// Errors
// ============================================================================

fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::NotFound | Error::Storage(DbError::NotFound) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Request failed: {}", err);
    }
    (status, Json(json!({ "ok": false, "msg": err.to_string() }))).into_response()
}

// ============================================================================
// API: Push
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PushQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub ping: Option<String>,
}

/// Turn push query parameters into a beat. Status defaults to up, msg to "OK".
fn parse_push(query: PushQuery, at: DateTime<Utc>) -> Result<Beat, Error> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => Status::Up,
        Some(s) if s.eq_ignore_ascii_case("up") => Status::Up,
        Some(s) if s.eq_ignore_ascii_case("down") => Status::Down,
        Some(s) => return Err(Error::InvalidInput(format!("status must be up or down, got {:?}", s))),
    };

    let ping = match query.ping.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(
            s.parse::<f64>()
                .map_err(|_| Error::InvalidInput(format!("ping is not a number: {:?}", s)))?,
        ),
    };

    let mut beat = Beat::new(status, at).with_ping(ping);
    if let Some(msg) = query.msg.filter(|m| !m.is_empty()) {
        beat = beat.with_msg(msg);
    }
    Ok(beat)
}

pub async fn handle_push(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<PushQuery>,
) -> Response {
    let beat = match parse_push(query, Utc::now()) {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state.pipeline.ingest_push(&token, beat).await {
        Ok(_) => Json(json!({ "ok": true })).into_response(),
        // The heartbeat is already stored; delivery failures were logged by the pipeline.
        Err(Error::Notify(_)) | Err(Error::Broadcast(_)) => Json(json!({ "ok": true })).into_response(),
        Err(e) => error_response(&e),
    }
}

// ============================================================================
// API: Uptime
// ============================================================================

#[derive(Debug, Serialize, PartialEq)]
pub struct UptimeResponse {
    pub uptime: Option<f64>,
    pub avg_ping: Option<f64>,
}

/// Resolve a monitor's uptime over a duration token. `Err(NoData)` passes through.
fn query_uptime(
    state: &AppState,
    monitor_id: i64,
    token: &str,
) -> Result<crate::uptime::UptimeData, Error> {
    let seconds = parse_duration(&normalize_duration(token))?;
    state.pipeline.store().get_monitor(monitor_id).map_err(|e| match e {
        DbError::NotFound => Error::NotFound,
        other => other.into(),
    })?;
    let calc = state.pipeline.calculator(monitor_id)?;
    calc.get_data_by_duration(seconds, Utc::now())
}

pub async fn handle_get_uptime(
    State(state): State<AppState>,
    Path((id, duration)): Path<(i64, String)>,
) -> Response {
    match query_uptime(&state, id, &duration) {
        Ok(data) => Json(UptimeResponse {
            uptime: Some(data.uptime),
            avg_ping: data.avg_ping,
        })
        .into_response(),
        Err(Error::NoData) => Json(UptimeResponse {
            uptime: None,
            avg_ping: None,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

// ============================================================================
// API: Report
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub message: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub duration: Option<String>,
    pub status: Option<String>,
    pub active: Option<String>,
    pub retries: Option<String>,
}

/// Blank parameters are treated as absent.
fn param(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_param<T: std::str::FromStr>(value: &Option<String>, name: &str) -> Result<Option<T>, Error> {
    param(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| Error::InvalidInput(format!("{} is not valid: {:?}", name, v)))
        })
        .transpose()
}

fn parse_time(value: &Option<String>, name: &str) -> Result<Option<DateTime<Utc>>, Error> {
    param(value)
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| Error::InvalidInput(format!("{} must be an RFC 3339 time: {:?}", name, v)))
        })
        .transpose()
}

fn parse_report(query: &ReportQuery) -> Result<ReportFilter, Error> {
    let limit = match param(&query.limit) {
        None => Some(DEFAULT_REPORT_LIMIT),
        Some(l) if l.eq_ignore_ascii_case("any") => None,
        Some(_) => match parse_param::<u32>(&query.limit, "limit")? {
            Some(0) => return Err(Error::InvalidInput("limit must be greater than zero".to_string())),
            l => l,
        },
    };

    let page = parse_param::<u32>(&query.page, "page")?.unwrap_or(1);
    if page == 0 {
        return Err(Error::InvalidInput("page starts at 1".to_string()));
    }

    let status = match param(&query.status) {
        None => None,
        Some(s) => Some(match s.parse::<i64>() {
            Ok(code) => Status::from_code(code)
                .ok_or_else(|| Error::InvalidInput(format!("unknown status code: {}", code)))?,
            Err(_) => s.parse::<Status>().map_err(Error::InvalidInput)?,
        }),
    };

    let active = match param(&query.active) {
        None => None,
        Some("1") | Some("true") => Some(true),
        Some("0") | Some("false") => Some(false),
        Some(other) => return Err(Error::InvalidInput(format!("active must be true or false: {:?}", other))),
    };

    Ok(ReportFilter {
        heartbeat_id: parse_param(&query.id, "id")?,
        name: param(&query.name).map(String::from),
        message: param(&query.message).map(String::from),
        duration: parse_param(&query.duration, "duration")?,
        status,
        active,
        retries: parse_param(&query.retries, "retries")?,
        from: parse_time(&query.from, "from")?,
        to: parse_time(&query.to, "to")?,
        page,
        limit,
    })
}

pub async fn handle_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let filter = match parse_report(&query) {
        Ok(f) => f,
        Err(e) => return error_response(&e),
    };
    match state.pipeline.store().report(&filter) {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(&Error::from(e)),
    }
}

// ============================================================================
// API: Badges
// ============================================================================

fn badge_response(values: BadgeValues) -> Response {
    Json(values).into_response()
}

pub async fn handle_status_badge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(opts): Query<BadgeOptions>,
) -> Response {
    let opts = match opts.validate() {
        Ok(o) => o,
        Err(e) => return error_response(&e),
    };

    let store = state.pipeline.store();
    let latest = match store.get_monitor(id) {
        Ok(_) => match store.get_previous_heartbeat(id) {
            Ok(hb) => hb.map(|h| h.status),
            Err(e) => return error_response(&Error::from(e)),
        },
        Err(DbError::NotFound) => None,
        Err(e) => return error_response(&Error::from(e)),
    };

    badge_response(badge::status_badge(&opts, latest))
}

pub async fn handle_uptime_badge_default(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(opts): Query<BadgeOptions>,
) -> Response {
    uptime_badge(&state, id, DEFAULT_BADGE_DURATION, opts)
}

pub async fn handle_uptime_badge(
    State(state): State<AppState>,
    Path((id, duration)): Path<(i64, String)>,
    Query(opts): Query<BadgeOptions>,
) -> Response {
    uptime_badge(&state, id, &duration, opts)
}

fn uptime_badge(state: &AppState, id: i64, duration: &str, opts: BadgeOptions) -> Response {
    let opts = match opts.validate() {
        Ok(o) => o,
        Err(e) => return error_response(&e),
    };
    let token = normalize_duration(duration);
    let data = query_uptime(state, id, &token);
    match data {
        Err(e @ Error::InvalidInput(_)) => error_response(&e),
        Err(e @ Error::Storage(_)) => error_response(&e),
        data => badge_response(badge::uptime_badge(&opts, &token, data)),
    }
}

pub async fn handle_ping_badge_default(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(opts): Query<BadgeOptions>,
) -> Response {
    ping_badge(&state, id, DEFAULT_BADGE_DURATION, opts)
}

pub async fn handle_ping_badge(
    State(state): State<AppState>,
    Path((id, duration)): Path<(i64, String)>,
    Query(opts): Query<BadgeOptions>,
) -> Response {
    ping_badge(&state, id, &duration, opts)
}

fn ping_badge(state: &AppState, id: i64, duration: &str, opts: BadgeOptions) -> Response {
    let opts = match opts.validate() {
        Ok(o) => o,
        Err(e) => return error_response(&e),
    };
    let token = normalize_duration(duration);
    let avg_ping = match query_uptime(state, id, &token) {
        Ok(data) => data.avg_ping,
        Err(Error::NoData) | Err(Error::NotFound) => None,
        Err(e) => return error_response(&e),
    };
    badge_response(badge::ping_badge(&opts, &token, avg_ping))
}

pub async fn handle_response_badge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(opts): Query<BadgeOptions>,
) -> Response {
    let opts = match opts.validate() {
        Ok(o) => o,
        Err(e) => return error_response(&e),
    };

    let store = state.pipeline.store();
    let ping = match store.get_monitor(id) {
        Ok(_) => match store.get_previous_heartbeat(id) {
            Ok(hb) => hb.and_then(|h| h.ping),
            Err(e) => return error_response(&Error::from(e)),
        },
        Err(DbError::NotFound) => None,
        Err(e) => return error_response(&Error::from(e)),
    };

    badge_response(badge::response_badge(&opts, ping))
}

pub async fn handle_avg_response_badge_default(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(opts): Query<BadgeOptions>,
) -> Response {
    avg_response_badge(&state, id, DEFAULT_BADGE_DURATION, opts)
}

pub async fn handle_avg_response_badge(
    State(state): State<AppState>,
    Path((id, duration)): Path<(i64, String)>,
    Query(opts): Query<BadgeOptions>,
) -> Response {
    avg_response_badge(&state, id, &duration, opts)
}

fn avg_response_badge(state: &AppState, id: i64, duration: &str, opts: BadgeOptions) -> Response {
    let opts = match opts.validate() {
        Ok(o) => o,
        Err(e) => return error_response(&e),
    };
    let token = match cap_duration(duration, MAX_AVG_RESPONSE_HOURS) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };
    let avg_ping = match query_uptime(state, id, &token) {
        Ok(data) => data.avg_ping,
        Err(Error::NoData) | Err(Error::NotFound) => None,
        Err(e) => return error_response(&e),
    };
    badge_response(badge::avg_response_badge(&opts, &token, avg_ping))
}

/// Normalized token, replaced by `{max_hours}h` when it asks for more.
fn cap_duration(duration: &str, max_hours: u64) -> Result<String, Error> {
    let token = normalize_duration(duration);
    if parse_duration(&token)? > max_hours * 3_600 {
        Ok(format!("{}h", max_hours))
    } else {
        Ok(token)
    }
}

// ============================================================================
// Metrics
// ============================================================================

pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.pipeline.metrics().render(),
    )
}

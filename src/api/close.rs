//! Close trigger and run read-back endpoints.
//!
//! Routes:
//! - `POST /close/run`        — run the pipeline for one date, synchronously
//! - `POST /close/backfill`   — close an inclusive date range
//! - `GET  /close/runs`       — paginated run history, newest first
//! - `GET  /close/runs/:date` — latest run for a date

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::pipeline::{BackfillSummary, RunSummary};
use crate::runs::CloseRun;

use super::{error_response, parse_date, ApiState};

// ---- Request / response shapes ----

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub date: String,
    pub force: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    pub from: String,
    pub to: String,
    pub force: Option<bool>,
    pub skip_existing: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunsResponse {
    pub items: Vec<CloseRun>,
}

// ---- Handlers ----

/// `POST /close/run` — execute the pipeline for one business day.
///
/// A pipeline failure has already been recorded on the run row by the time
/// it surfaces here; the 500 response carries the same error message.
pub async fn trigger_close(
    State(state): State<ApiState>,
    Json(body): Json<TriggerRequest>,
) -> Result<Json<RunSummary>, (StatusCode, Json<serde_json::Value>)> {
    let date = parse_date(&body.date)?;
    let force = body.force.unwrap_or(false);

    let summary = state.run(date, force).await.map_err(error_response)?;

    Ok(Json(summary))
}

/// `POST /close/backfill` — close an inclusive date range sequentially.
pub async fn backfill(
    State(state): State<ApiState>,
    Json(body): Json<BackfillRequest>,
) -> Result<Json<BackfillSummary>, (StatusCode, Json<serde_json::Value>)> {
    let from = parse_date(&body.from)?;
    let to = parse_date(&body.to)?;
    let force = body.force.unwrap_or(false);
    let skip_existing = body.skip_existing.unwrap_or(true);

    let summary = state
        .backfill(from, to, force, skip_existing)
        .await
        .map_err(error_response)?;

    Ok(Json(summary))
}

/// `GET /close/runs` — newest-first run history.
///
/// Query params: `limit` (default 20, clamped to 100) and `offset`.
pub async fn list_runs(
    State(state): State<ApiState>,
    Query(params): Query<RunsQuery>,
) -> Result<Json<RunsResponse>, (StatusCode, Json<serde_json::Value>)> {
    let limit = params.limit.unwrap_or(20);
    let offset = params.offset.unwrap_or(0);

    let items = state.tracker.list(limit, offset).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    Ok(Json(RunsResponse { items }))
}

/// `GET /close/runs/:date` — latest run for a date, 404 when none exists.
pub async fn run_status(
    State(state): State<ApiState>,
    Path(date): Path<String>,
) -> Result<Json<CloseRun>, (StatusCode, Json<serde_json::Value>)> {
    let date = parse_date(&date)?;

    let run = state.tracker.latest(date).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    match run {
        Some(run) => Ok(Json(run)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("No close run recorded for {}", date) })),
        )),
    }
}

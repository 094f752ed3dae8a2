//! Thin HTTP surface.
//!
//! Routing and request validation only — all close semantics live in the
//! core components. Dates are validated as `YYYY-MM-DD` strings before
//! anything reaches the pipeline.

pub mod close;
pub mod health;
pub mod ledger;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::pipeline::PipelineOrchestrator;

/// Shared state for all routes.
pub type ApiState = Arc<PipelineOrchestrator>;

/// Build the complete application router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics))
        .route("/close/run", post(close::trigger_close))
        .route("/close/backfill", post(close::backfill))
        .route("/close/runs", get(close::list_runs))
        .route("/close/runs/:date", get(close::run_status))
        .route("/close/ledger/:date", get(ledger::ledger_entries))
        .route("/close/documents/:date", get(ledger::documents))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), track_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `GET /metrics` — Prometheus text exposition.
async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// Count and time every request, labelled by the matched route template
/// (not the raw path — date segments would blow up label cardinality).
async fn track_metrics(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(req).await;

    state
        .metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), path.as_str(), response.status().as_str()])
        .inc();
    state
        .metrics
        .http_request_duration
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Parse a `YYYY-MM-DD` path or body value, rejecting anything else.
pub(crate) fn parse_date(
    value: &str,
) -> Result<NaiveDate, (StatusCode, Json<serde_json::Value>)> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Invalid date '{}'. Expected YYYY-MM-DD", value)
            })),
        )
    })
}

/// Map a core error onto an HTTP status + JSON body.
pub(crate) fn error_response(err: AppError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_business_day_keys() {
        assert_eq!(
            parse_date("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn parse_date_rejects_malformed_values() {
        assert!(parse_date("03/01/2024").is_err());
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn validation_errors_map_to_400() {
        let (status, _) = error_response(AppError::Validation("bad".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_response(AppError::Db("down".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

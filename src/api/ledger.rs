//! Ledger and document read-back endpoints.
//!
//! Pure projections over what the pipeline has already written.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::artifacts::DocumentRecord;
use crate::ledger::{LedgerEntry, REF_TYPE_DAILY_CLOSE};

use super::{parse_date, ApiState};

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub date: String,
    pub total_debit: i64,
    pub total_credit: i64,
    pub entries: Vec<LedgerEntry>,
}

/// `GET /close/ledger/:date` — all ledger legs posted for a date.
pub async fn ledger_entries(
    State(state): State<ApiState>,
    Path(date): Path<String>,
) -> Result<Json<LedgerResponse>, (StatusCode, Json<serde_json::Value>)> {
    let date = parse_date(&date)?;

    let entries = state.journalizer.list_entries(date).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    let total_debit = entries.iter().map(|e| e.debit).sum();
    let total_credit = entries.iter().map(|e| e.credit).sum();

    Ok(Json(LedgerResponse {
        date: date.to_string(),
        total_debit,
        total_credit,
        entries,
    }))
}

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub date: String,
    pub items: Vec<DocumentRecord>,
}

/// `GET /close/documents/:date` — artifacts indexed for a date.
pub async fn documents(
    State(state): State<ApiState>,
    Path(date): Path<String>,
) -> Result<Json<DocumentsResponse>, (StatusCode, Json<serde_json::Value>)> {
    let date = parse_date(&date)?;

    let items = state
        .document_index
        .list(REF_TYPE_DAILY_CLOSE, &date.to_string())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        })?;

    Ok(Json(DocumentsResponse { date: date.to_string(), items }))
}

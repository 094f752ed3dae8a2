//! Artifact rendering, publication, and indexing.
//!
//! Three artifacts are published per close: the report JSON, the raw
//! settlement evidence JSON, and a rendered HTML summary — all under
//! `daily-close/{date}/`. Publication is all-or-nothing within a run: the
//! orchestrator aborts on the first storage failure. Each published key is
//! then registered in the `documents` index, idempotently.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::report::{DailyReport, EvidenceBundle};

/// Blob keys for one business day: (report JSON, evidence JSON, HTML).
pub fn artifact_keys(date: NaiveDate) -> (String, String, String) {
    (
        format!("daily-close/{}/report.json", date),
        format!("daily-close/{}/stripe-evidence.json", date),
        format!("daily-close/{}/report.html", date),
    )
}

/// Blob storage contract.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError>;
    async fn put_text(&self, key: &str, value: &str) -> Result<(), AppError>;
}

/// Filesystem-backed blob store rooted at `ARTIFACT_ROOT`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), AppError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| AppError::Storage(err.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| AppError::Storage(err.to_string()))
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|err| AppError::Parse(err.to_string()))?;
        self.write(key, bytes).await
    }

    async fn put_text(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.write(key, value.as_bytes().to_vec()).await
    }
}

/// Render the close summary as a standalone HTML page.
///
/// Pure and synchronous: same report + evidence in, same markup out.
pub fn render_html(report: &DailyReport, evidence: &EvidenceBundle) -> String {
    let anomaly_row = format!(
        "<tr><th>Reconciliation</th><td class=\"{:?}\">{} (diff {})</td></tr>",
        report.anomalies.level, report.anomalies.message, report.anomalies.diff
    );

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Daily close {date}</title></head>\n\
         <body>\n<h1>Daily close — {date}</h1>\n<table>\n\
         <tr><th>Orders</th><td>{orders} (net {net}, tax {tax})</td></tr>\n\
         <tr><th>Payments</th><td>{payments} (total {amount}, fees {fees})</td></tr>\n\
         <tr><th>Refunds</th><td>{refunds} (total {refund_total})</td></tr>\n\
         {anomaly_row}\n\
         </table>\n<p>{evidence_payments} payment records, {evidence_refunds} refund records attached.</p>\n\
         </body>\n</html>\n",
        date = report.date,
        orders = report.orders.count,
        net = report.orders.total_net,
        tax = report.orders.total_tax,
        payments = report.payments.count,
        amount = report.payments.total_amount,
        fees = report.payments.total_fee,
        refunds = report.refunds.count,
        refund_total = report.refunds.total_amount,
        anomaly_row = anomaly_row,
        evidence_payments = evidence.payments.len(),
        evidence_refunds = evidence.refunds.len(),
    )
}

/// One indexed document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub ref_type: String,
    pub ref_id: String,
    pub path: String,
    pub content_type: String,
    pub created_at: String,
}

/// Idempotent registry of published artifacts.
pub struct DocumentIndex {
    pool: SqlitePool,
}

impl DocumentIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a document. Re-registering the same `(ref_type, ref_id,
    /// path)` refreshes the content type instead of duplicating the row.
    pub async fn upsert(
        &self,
        ref_type: &str,
        ref_id: &str,
        path: &str,
        content_type: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO documents (ref_type, ref_id, path, content_type)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(ref_type, ref_id, path)
             DO UPDATE SET content_type = excluded.content_type",
        )
        .bind(ref_type)
        .bind(ref_id)
        .bind(path)
        .bind(content_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All documents registered under a reference, oldest first.
    pub async fn list(
        &self,
        ref_type: &str,
        ref_id: &str,
    ) -> Result<Vec<DocumentRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, ref_type, ref_id, path, content_type, created_at
             FROM documents
             WHERE ref_type = ? AND ref_id = ?
             ORDER BY id ASC",
        )
        .bind(ref_type)
        .bind(ref_id)
        .fetch_all(&self.pool)
        .await?;

        let documents = rows
            .into_iter()
            .filter_map(|row| {
                use sqlx::Row;
                let id: i64 = row.try_get("id").ok()?;
                let ref_type: String = row.try_get("ref_type").ok()?;
                let ref_id: String = row.try_get("ref_id").ok()?;
                let path: String = row.try_get("path").ok()?;
                let content_type: String = row.try_get("content_type").ok()?;
                let created_at: String = row.try_get("created_at").ok()?;

                Some(DocumentRecord { id, ref_type, ref_id, path, content_type, created_at })
            })
            .collect();

        Ok(documents)
    }
}

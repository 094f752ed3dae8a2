//! Webhook alert delivery.
//!
//! Dispatches HTTP POST notifications to the configured webhook target when
//! an anomaly alert crosses the notification threshold, and when a scheduled
//! close fails outright. Every delivery attempt — successful or not — is
//! persisted in the `alert_deliveries` table. Delivery is best-effort:
//! [`AlertSink::send`] never returns an error, so a dead webhook can never
//! fail the pipeline or the alert row creation that triggered it.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::Severity;

/// A single delivery-log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: i64,
    pub kind: String,
    pub severity: String,
    pub webhook_url: String,
    pub delivered: bool,
    pub triggered_at: String,
}

/// Best-effort webhook notification sink.
pub struct AlertSink {
    pool: SqlitePool,
    webhook_url: Option<String>,
    http: reqwest::Client,
}

impl AlertSink {
    pub fn new(pool: SqlitePool, webhook_url: Option<String>) -> Self {
        Self {
            pool,
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    /// Deliver a notification and log the outcome.
    ///
    /// With no webhook configured the notification is logged locally and
    /// dropped. Failures are retried once with jitter, then recorded as
    /// undelivered.
    pub async fn send(
        &self,
        kind: &str,
        severity: Severity,
        message: &str,
        details: serde_json::Value,
    ) {
        let url = match &self.webhook_url {
            Some(url) => url.clone(),
            None => {
                tracing::debug!(
                    "No webhook configured — dropping {} notification: {}",
                    severity.as_str(),
                    message
                );
                return;
            }
        };

        let payload = serde_json::json!({
            "kind": kind,
            "severity": severity.as_str(),
            "message": message,
            "details": details,
        });

        let delivered = self.post_with_retry(&url, &payload).await;
        if !delivered {
            tracing::error!("Webhook delivery failed for {} ({})", kind, url);
        }

        let row = sqlx::query(
            "INSERT INTO alert_deliveries (kind, severity, webhook_url, delivered, triggered_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(kind)
        .bind(severity.as_str())
        .bind(&url)
        .bind(if delivered { 1i64 } else { 0i64 })
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(err) = row {
            tracing::error!("Failed to log alert delivery for {}: {}", kind, err);
        }
    }

    /// One attempt plus one jittered retry. Returns whether a 2xx landed.
    async fn post_with_retry(&self, url: &str, payload: &serde_json::Value) -> bool {
        for attempt in 0..2 {
            if attempt > 0 {
                let jitter_ms = rand::thread_rng().gen_range(0..300u64);
                tokio::time::sleep(Duration::from_millis(200 + jitter_ms)).await;
            }

            match self.http.post(url).json(payload).send().await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => {
                    tracing::warn!(
                        "Webhook returned HTTP {} (attempt {})",
                        response.status(),
                        attempt + 1
                    );
                }
                Err(err) => {
                    tracing::warn!("Webhook request error (attempt {}): {}", attempt + 1, err);
                }
            }
        }
        false
    }

    /// Most recent delivery-log rows, newest first. `limit` clamped to 100.
    pub async fn recent_deliveries(&self, limit: i64) -> Result<Vec<DeliveryRecord>, sqlx::Error> {
        let limit = limit.clamp(1, 100);

        let rows = sqlx::query(
            "SELECT id, kind, severity, webhook_url, delivered, triggered_at
             FROM alert_deliveries
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .filter_map(|row| {
                use sqlx::Row;
                let id: i64 = row.try_get("id").ok()?;
                let kind: String = row.try_get("kind").ok()?;
                let severity: String = row.try_get("severity").ok()?;
                let webhook_url: String = row.try_get("webhook_url").ok()?;
                let delivered: i64 = row.try_get("delivered").ok()?;
                let triggered_at: String = row.try_get("triggered_at").ok()?;

                Some(DeliveryRecord {
                    id,
                    kind,
                    severity,
                    webhook_url,
                    delivered: delivered != 0,
                    triggered_at,
                })
            })
            .collect();

        Ok(records)
    }
}

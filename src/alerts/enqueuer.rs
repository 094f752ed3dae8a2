//! Deduplicated anomaly alert creation.
//!
//! The `anomaly_alerts` table carries a `UNIQUE(kind, alert_date)`
//! constraint — the one true exclusivity guarantee in the system. A
//! constraint hit on insert is the "already alerted today" control-flow
//! signal, not an error; any other database error propagates.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::report::{AnomalyLevel, DailyReport};

use super::{AlertSink, Severity};

/// Dedup kind for the day-level reconciliation alert.
pub const KIND_DAILY_CLOSE: &str = "daily_close_anomaly";

/// A stored alert row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub id: i64,
    pub kind: String,
    pub alert_date: NaiveDate,
    pub severity: String,
    pub body: serde_json::Value,
    pub created_at: String,
}

/// Creates alert rows and fans out best-effort notifications.
pub struct AnomalyEnqueuer {
    pool: SqlitePool,
    sink: Arc<AlertSink>,
}

impl AnomalyEnqueuer {
    pub fn new(pool: SqlitePool, sink: Arc<AlertSink>) -> Self {
        Self { pool, sink }
    }

    /// Enqueue the day-level reconciliation alert for a report.
    ///
    /// Returns `true` iff a new alert row was created. A report with
    /// `anomalies.level == ok` never creates a row.
    pub async fn enqueue(
        &self,
        report: &DailyReport,
        artifact_keys: &[String],
    ) -> Result<bool, sqlx::Error> {
        let severity = match report.anomalies.level {
            AnomalyLevel::Ok => return Ok(false),
            AnomalyLevel::Warning => Severity::Warning,
            AnomalyLevel::Critical => Severity::Critical,
        };

        let body = serde_json::json!({
            "date": report.date,
            "level": report.anomalies.level,
            "diff": report.anomalies.diff,
            "message": report.anomalies.message,
            "artifacts": artifact_keys,
        });

        self.enqueue_alert(
            KIND_DAILY_CLOSE,
            report.date,
            severity,
            &report.anomalies.message,
            body,
        )
        .await
    }

    /// Insert an alert row under the `(kind, date)` unique constraint.
    ///
    /// Used by both the daily-close reconciliation path and the rule engine
    /// detectors (with rule-specific kinds such as `low_stock_{variant}`).
    /// For severity above `info` a notification is fired without blocking —
    /// delivery failure never fails the alert creation.
    pub async fn enqueue_alert(
        &self,
        kind: &str,
        date: NaiveDate,
        severity: Severity,
        message: &str,
        body: serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO anomaly_alerts (kind, alert_date, severity, body)
             VALUES (?, ?, ?, ?)",
        )
        .bind(kind)
        .bind(date.to_string())
        .bind(severity.as_str())
        .bind(body.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!("Alert created: {} for {} ({})", kind, date, severity.as_str());

                if severity != Severity::Info {
                    let sink = Arc::clone(&self.sink);
                    let kind = kind.to_string();
                    let message = message.to_string();
                    tokio::spawn(async move {
                        sink.send(&kind, severity, &message, body).await;
                    });
                }

                Ok(true)
            }
            Err(err) if is_unique_violation(&err) => {
                tracing::debug!("Alert {} for {} already exists — dedup hit", kind, date);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// All alert rows for a date, oldest first.
    pub async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<AnomalyAlert>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, kind, alert_date, severity, body, created_at
             FROM anomaly_alerts
             WHERE alert_date = ?
             ORDER BY id ASC",
        )
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        let alerts = rows
            .into_iter()
            .filter_map(|row| {
                use sqlx::Row;
                let id: i64 = row.try_get("id").ok()?;
                let kind: String = row.try_get("kind").ok()?;
                let alert_date_str: String = row.try_get("alert_date").ok()?;
                let severity: String = row.try_get("severity").ok()?;
                let body_str: String = row.try_get("body").ok()?;
                let created_at: String = row.try_get("created_at").ok()?;

                let alert_date = NaiveDate::parse_from_str(&alert_date_str, "%Y-%m-%d").ok()?;
                let body = serde_json::from_str(&body_str).ok()?;

                Some(AnomalyAlert { id, kind, alert_date, severity, body, created_at })
            })
            .collect();

        Ok(alerts)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use crate::report::{
        AnomalySummary, DailyReport, OrderTotals, PaymentTotals, RefundTotals,
    };

    async fn make_enqueuer() -> AnomalyEnqueuer {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let sink = Arc::new(AlertSink::new(pool.clone(), None));
        AnomalyEnqueuer::new(pool, sink)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn make_report(level: AnomalyLevel, diff: i64) -> DailyReport {
        DailyReport {
            date: day(),
            orders: OrderTotals { count: 5, total_net: 10_000, total_fee: 0, total_tax: 0 },
            payments: PaymentTotals { count: 5, total_amount: 10_000 - diff, total_fee: 300 },
            refunds: RefundTotals { count: 0, total_amount: 0 },
            anomalies: AnomalySummary {
                level,
                diff,
                message: "order totals do not match captured payments".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn ok_level_never_creates_a_row() {
        let enqueuer = make_enqueuer().await;
        let created = enqueuer
            .enqueue(&make_report(AnomalyLevel::Ok, 0), &[])
            .await
            .unwrap();

        assert!(!created);
        assert!(enqueuer.list_for_date(day()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_enqueue_creates_second_dedups() {
        let enqueuer = make_enqueuer().await;
        let report = make_report(AnomalyLevel::Warning, 500);

        let first = enqueuer.enqueue(&report, &[]).await.unwrap();
        assert!(first);

        let second = enqueuer.enqueue(&report, &[]).await.unwrap();
        assert!(!second);

        let alerts = enqueuer.list_for_date(day()).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, KIND_DAILY_CLOSE);
        assert_eq!(alerts[0].severity, "warning");
    }

    #[tokio::test]
    async fn alert_body_snapshots_report_and_artifacts() {
        let enqueuer = make_enqueuer().await;
        let report = make_report(AnomalyLevel::Critical, 1_200);
        let keys = vec!["daily-close/2024-03-01/report.json".to_string()];

        enqueuer.enqueue(&report, &keys).await.unwrap();

        let alerts = enqueuer.list_for_date(day()).await.unwrap();
        assert_eq!(alerts[0].severity, "critical");
        assert_eq!(alerts[0].body["diff"], 1_200);
        assert_eq!(alerts[0].body["artifacts"][0], "daily-close/2024-03-01/report.json");
    }

    #[tokio::test]
    async fn rule_kinds_dedup_independently_per_entity() {
        let enqueuer = make_enqueuer().await;

        let a = enqueuer
            .enqueue_alert(
                "low_stock_variant_1",
                day(),
                Severity::Warning,
                "stock low",
                serde_json::json!({ "remaining": 2 }),
            )
            .await
            .unwrap();
        let b = enqueuer
            .enqueue_alert(
                "low_stock_variant_2",
                day(),
                Severity::Warning,
                "stock low",
                serde_json::json!({ "remaining": 1 }),
            )
            .await
            .unwrap();
        let dup = enqueuer
            .enqueue_alert(
                "low_stock_variant_1",
                day(),
                Severity::Warning,
                "stock low",
                serde_json::json!({ "remaining": 2 }),
            )
            .await
            .unwrap();

        assert!(a);
        assert!(b);
        assert!(!dup);
        assert_eq!(enqueuer.list_for_date(day()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn same_kind_different_dates_both_insert() {
        let enqueuer = make_enqueuer().await;
        let other = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let a = enqueuer
            .enqueue_alert(KIND_DAILY_CLOSE, day(), Severity::Warning, "m", serde_json::Value::Null)
            .await
            .unwrap();
        let b = enqueuer
            .enqueue_alert(KIND_DAILY_CLOSE, other, Severity::Warning, "m", serde_json::Value::Null)
            .await
            .unwrap();

        assert!(a);
        assert!(b);
    }
}

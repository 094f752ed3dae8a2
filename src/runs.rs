//! Append-only history of daily-close attempts.
//!
//! Every pipeline invocation inserts a new `running` row via
//! [`RunTracker::start`] and mutates it exactly once at completion via
//! [`RunTracker::complete`]. Rows are never deleted and there is **no
//! uniqueness on the close date**: two concurrent invocations for the same
//! day both succeed and leave two rows. Double-posting is prevented by the
//! ledger layer, not here.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Terminal and non-terminal states of a close attempt.
///
/// `running → {success, failed}`; both ends are terminal. A forced retry
/// creates a new row rather than reopening a terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One close attempt row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRun {
    pub id: i64,
    pub close_date: NaiveDate,
    pub status: RunStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub forced: bool,
    pub artifacts_generated: i64,
    pub ledger_entries_created: i64,
    pub anomaly_detected: bool,
    pub error_message: Option<String>,
}

/// Terminal counters written back when a run finishes.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub status: RunStatus,
    pub artifacts_generated: i64,
    pub ledger_entries_created: i64,
    pub anomaly_detected: bool,
    pub error_message: Option<String>,
}

impl CloseOutcome {
    pub fn success(artifacts: i64, ledger_entries: i64, anomaly: bool) -> Self {
        Self {
            status: RunStatus::Success,
            artifacts_generated: artifacts,
            ledger_entries_created: ledger_entries,
            anomaly_detected: anomaly,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            artifacts_generated: 0,
            ledger_entries_created: 0,
            anomaly_detected: false,
            error_message: Some(message.into()),
        }
    }
}

/// Repository for the `daily_close_runs` audit trail.
pub struct RunTracker {
    pool: SqlitePool,
}

impl RunTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new `running` row and return its id.
    ///
    /// Intentionally unguarded: concurrent calls for the same date both
    /// succeed and return distinct ids.
    pub async fn start(&self, date: NaiveDate, forced: bool) -> Result<i64, sqlx::Error> {
        let started_at = Utc::now().to_rfc3339();
        let forced_int: i64 = if forced { 1 } else { 0 };

        let result = sqlx::query(
            "INSERT INTO daily_close_runs (close_date, status, started_at, forced)
             VALUES (?, 'running', ?, ?)",
        )
        .bind(date.to_string())
        .bind(&started_at)
        .bind(forced_int)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Write the terminal state for a run. Last write wins; there is no
    /// guard against double completion.
    pub async fn complete(&self, run_id: i64, outcome: &CloseOutcome) -> Result<(), sqlx::Error> {
        let completed_at = Utc::now().to_rfc3339();
        let anomaly_int: i64 = if outcome.anomaly_detected { 1 } else { 0 };

        sqlx::query(
            "UPDATE daily_close_runs
             SET status = ?, completed_at = ?, artifacts_generated = ?,
                 ledger_entries_created = ?, anomaly_detected = ?, error_message = ?
             WHERE id = ?",
        )
        .bind(outcome.status.as_str())
        .bind(&completed_at)
        .bind(outcome.artifacts_generated)
        .bind(outcome.ledger_entries_created)
        .bind(anomaly_int)
        .bind(outcome.error_message.as_deref())
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent run for a date, if any.
    pub async fn latest(&self, date: NaiveDate) -> Result<Option<CloseRun>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, close_date, status, started_at, completed_at, forced,
                    artifacts_generated, ledger_entries_created, anomaly_detected, error_message
             FROM daily_close_runs
             WHERE close_date = ?
             ORDER BY id DESC
             LIMIT 1",
        )
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(parse_run_row).next())
    }

    /// True iff any row for the date reached `success`.
    pub async fn has_successful(&self, date: NaiveDate) -> Result<bool, sqlx::Error> {
        use sqlx::Row;

        let row = sqlx::query(
            "SELECT COUNT(*) as cnt FROM daily_close_runs
             WHERE close_date = ? AND status = 'success'",
        )
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("cnt").unwrap_or(0);
        Ok(count > 0)
    }

    /// Newest-first page of the run history. `limit` is clamped to 100.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<CloseRun>, sqlx::Error> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        let rows = sqlx::query(
            "SELECT id, close_date, status, started_at, completed_at, forced,
                    artifacts_generated, ledger_entries_created, anomaly_detected, error_message
             FROM daily_close_runs
             ORDER BY id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(parse_run_row).collect())
    }
}

fn parse_run_row(row: sqlx::sqlite::SqliteRow) -> Option<CloseRun> {
    use sqlx::Row;

    let id: i64 = row.try_get("id").ok()?;
    let close_date_str: String = row.try_get("close_date").ok()?;
    let status_str: String = row.try_get("status").ok()?;
    let started_at: String = row.try_get("started_at").ok()?;
    let completed_at: Option<String> = row.try_get("completed_at").ok()?;
    let forced: i64 = row.try_get("forced").ok()?;
    let artifacts_generated: i64 = row.try_get("artifacts_generated").ok()?;
    let ledger_entries_created: i64 = row.try_get("ledger_entries_created").ok()?;
    let anomaly_detected: i64 = row.try_get("anomaly_detected").ok()?;
    let error_message: Option<String> = row.try_get("error_message").ok()?;

    let close_date = NaiveDate::parse_from_str(&close_date_str, "%Y-%m-%d").ok()?;
    let status = RunStatus::parse(&status_str)?;

    Some(CloseRun {
        id,
        close_date,
        status,
        started_at,
        completed_at,
        forced: forced != 0,
        artifacts_generated,
        ledger_entries_created,
        anomaly_detected: anomaly_detected != 0,
        error_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    async fn make_tracker() -> RunTracker {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        RunTracker::new(pool)
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, n).unwrap()
    }

    #[tokio::test]
    async fn start_inserts_running_row() {
        let tracker = make_tracker().await;
        let id = tracker.start(day(1), false).await.unwrap();
        assert!(id > 0);

        let run = tracker.latest(day(1)).await.unwrap().unwrap();
        assert_eq!(run.id, id);
        assert_eq!(run.status, RunStatus::Running);
        assert!(!run.forced);
        assert!(run.completed_at.is_none());
    }

    #[tokio::test]
    async fn complete_success_updates_counters() {
        let tracker = make_tracker().await;
        let id = tracker.start(day(1), true).await.unwrap();

        tracker
            .complete(id, &CloseOutcome::success(3, 4, true))
            .await
            .unwrap();

        let run = tracker.latest(day(1)).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.artifacts_generated, 3);
        assert_eq!(run.ledger_entries_created, 4);
        assert!(run.anomaly_detected);
        assert!(run.forced);
        assert!(run.completed_at.is_some());
    }

    #[tokio::test]
    async fn failed_run_records_error_and_allows_retry() {
        let tracker = make_tracker().await;
        let id = tracker.start(day(1), false).await.unwrap();

        tracker
            .complete(id, &CloseOutcome::failed("blob store unreachable"))
            .await
            .unwrap();

        assert!(!tracker.has_successful(day(1)).await.unwrap());
        let run = tracker.latest(day(1)).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("blob store unreachable"));

        // Retry-after-failure: a new start for the same date succeeds.
        let retry_id = tracker.start(day(1), false).await.unwrap();
        assert!(retry_id > id);
    }

    #[tokio::test]
    async fn has_successful_only_after_success() {
        let tracker = make_tracker().await;
        assert!(!tracker.has_successful(day(1)).await.unwrap());

        let id = tracker.start(day(1), false).await.unwrap();
        assert!(!tracker.has_successful(day(1)).await.unwrap());

        tracker
            .complete(id, &CloseOutcome::success(3, 2, false))
            .await
            .unwrap();
        assert!(tracker.has_successful(day(1)).await.unwrap());
        assert!(!tracker.has_successful(day(2)).await.unwrap());
    }

    #[tokio::test]
    async fn latest_returns_most_recent_row() {
        let tracker = make_tracker().await;
        let first = tracker.start(day(1), false).await.unwrap();
        tracker
            .complete(first, &CloseOutcome::failed("boom"))
            .await
            .unwrap();
        let second = tracker.start(day(1), true).await.unwrap();

        let run = tracker.latest(day(1)).await.unwrap().unwrap();
        assert_eq!(run.id, second);
        assert_eq!(run.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn latest_returns_none_for_unknown_date() {
        let tracker = make_tracker().await;
        assert!(tracker.latest(day(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let tracker = make_tracker().await;
        for n in 1..=5 {
            tracker.start(day(n), false).await.unwrap();
        }

        let page = tracker.list(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].close_date, day(5));
        assert_eq!(page[1].close_date, day(4));

        let next = tracker.list(2, 2).await.unwrap();
        assert_eq!(next[0].close_date, day(3));
    }

    #[tokio::test]
    async fn concurrent_starts_for_same_date_both_succeed() {
        let tracker = make_tracker().await;

        // Documents the accepted race: no advisory lock on the date, so two
        // simultaneous invocations each get their own run row.
        let (a, b) = tokio::join!(tracker.start(day(1), false), tracker.start(day(1), false));
        let a = a.unwrap();
        let b = b.unwrap();
        assert_ne!(a, b);

        let page = tracker.list(10, 0).await.unwrap();
        assert_eq!(page.len(), 2);
    }
}

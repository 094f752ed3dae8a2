//! Daily-close pipeline orchestration.
//!
//! [`PipelineOrchestrator::run`] sequences one close attempt:
//! start run → generate report → collect evidence → render → publish three
//! artifacts → index documents → journalize ledger legs → enqueue the
//! reconciliation alert → run the rule engine → complete the run.
//!
//! There is no cross-step rollback. A failure in the middle records a
//! `failed` run row (the permanent evidence) and propagates; artifacts
//! already published stay in place. Recovery is a later trigger or an
//! explicit forced replay, which overwrites artifacts and replaces ledger
//! legs wholesale.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertSink, AnomalyEnqueuer, Severity};
use crate::artifacts::{artifact_keys, render_html, BlobStore, DocumentIndex};
use crate::error::AppError;
use crate::ledger::{LedgerJournalizer, REF_TYPE_DAILY_CLOSE};
use crate::metrics::AppMetrics;
use crate::rules::AnomalyRuleEngine;
use crate::runs::{CloseOutcome, RunStatus, RunTracker};
use crate::services::{EvidenceSource, OpsStatsSource, ReportSource};

/// Inclusive backfill ranges are capped at this many days.
pub const BACKFILL_MAX_DAYS: i64 = 90;

/// Result of one pipeline invocation, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub date: NaiveDate,
    pub status: RunStatus,
    pub forced: bool,
    pub artifacts_generated: i64,
    pub ledger_entries_created: i64,
    pub ledger_skipped: bool,
    pub anomaly_detected: bool,
    pub rule_alerts_created: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillResult {
    pub date: NaiveDate,
    pub status: BackfillStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<BackfillResult>,
}

/// Wires the close components to their collaborators.
pub struct PipelineOrchestrator {
    pub tracker: Arc<RunTracker>,
    pub journalizer: Arc<LedgerJournalizer>,
    pub enqueuer: Arc<AnomalyEnqueuer>,
    pub rule_engine: Arc<AnomalyRuleEngine>,
    pub report_source: Arc<dyn ReportSource>,
    pub evidence_source: Arc<dyn EvidenceSource>,
    pub ops_source: Arc<dyn OpsStatsSource>,
    pub blob_store: Arc<dyn BlobStore>,
    pub document_index: Arc<DocumentIndex>,
    pub sink: Arc<AlertSink>,
    pub metrics: Arc<AppMetrics>,
}

struct StepOutcome {
    artifacts_generated: i64,
    ledger_entries_created: i64,
    ledger_skipped: bool,
    anomaly_detected: bool,
    rule_alerts_created: usize,
}

impl PipelineOrchestrator {
    /// Execute one close attempt for `date`.
    ///
    /// Any failure between report generation and alerting is recorded on
    /// the run row as `failed` and returned to the caller. No automatic
    /// retry is scheduled.
    pub async fn run(&self, date: NaiveDate, force: bool) -> Result<RunSummary, AppError> {
        let run_id = self.tracker.start(date, force).await?;
        self.metrics.runs_started_total.inc();
        tracing::info!("Daily close started for {} (run {}, force={})", date, run_id, force);

        match self.execute(date, force).await {
            Ok(outcome) => {
                self.tracker
                    .complete(
                        run_id,
                        &CloseOutcome::success(
                            outcome.artifacts_generated,
                            outcome.ledger_entries_created,
                            outcome.anomaly_detected,
                        ),
                    )
                    .await?;

                self.metrics
                    .ledger_entries_created_total
                    .inc_by(outcome.ledger_entries_created as f64);

                tracing::info!(
                    "Daily close completed for {}: {} artifacts, {} ledger legs{}",
                    date,
                    outcome.artifacts_generated,
                    outcome.ledger_entries_created,
                    if outcome.ledger_skipped { " (journalize skipped)" } else { "" },
                );

                Ok(RunSummary {
                    run_id,
                    date,
                    status: RunStatus::Success,
                    forced: force,
                    artifacts_generated: outcome.artifacts_generated,
                    ledger_entries_created: outcome.ledger_entries_created,
                    ledger_skipped: outcome.ledger_skipped,
                    anomaly_detected: outcome.anomaly_detected,
                    rule_alerts_created: outcome.rule_alerts_created,
                })
            }
            Err(err) => {
                self.metrics.runs_failed_total.inc();
                tracing::error!("Daily close failed for {} (run {}): {}", date, run_id, err);

                if let Err(complete_err) = self
                    .tracker
                    .complete(run_id, &CloseOutcome::failed(err.to_string()))
                    .await
                {
                    tracing::error!(
                        "Could not record failure for run {}: {}",
                        run_id,
                        complete_err
                    );
                }

                Err(err)
            }
        }
    }

    /// Scheduled-path wrapper: failures are turned into a critical webhook
    /// alert instead of propagating.
    pub async fn run_scheduled(&self, date: NaiveDate) {
        if let Err(err) = self.run(date, false).await {
            self.sink
                .send(
                    "daily_close_failure",
                    Severity::Critical,
                    &format!("Scheduled daily close failed for {}", date),
                    serde_json::json!({ "date": date, "error": err.to_string() }),
                )
                .await;
        }
    }

    async fn execute(&self, date: NaiveDate, force: bool) -> Result<StepOutcome, AppError> {
        let report = self.report_source.generate(date).await?;
        let evidence = self.evidence_source.collect(date).await?;
        let html = render_html(&report, &evidence);

        let (report_key, evidence_key, html_key) = artifact_keys(date);

        let report_value =
            serde_json::to_value(&report).map_err(|err| AppError::Parse(err.to_string()))?;
        let evidence_value =
            serde_json::to_value(&evidence).map_err(|err| AppError::Parse(err.to_string()))?;

        self.blob_store.put_json(&report_key, &report_value).await?;
        self.blob_store.put_json(&evidence_key, &evidence_value).await?;
        self.blob_store.put_text(&html_key, &html).await?;

        let ref_id = date.to_string();
        self.document_index
            .upsert(REF_TYPE_DAILY_CLOSE, &ref_id, &report_key, "application/json")
            .await?;
        self.document_index
            .upsert(REF_TYPE_DAILY_CLOSE, &ref_id, &evidence_key, "application/json")
            .await?;
        self.document_index
            .upsert(REF_TYPE_DAILY_CLOSE, &ref_id, &html_key, "text/html")
            .await?;

        let journal = self.journalizer.journalize(date, &report, force).await?;

        let keys = vec![report_key, evidence_key, html_key];
        let anomaly_detected = self.enqueuer.enqueue(&report, &keys).await?;
        if anomaly_detected {
            self.metrics.alerts_created_total.inc();
        }

        // A snapshot fetch failure skips the rules for the day; detector
        // failures are isolated inside the engine.
        let rule_alerts_created = match self.ops_source.snapshot(date).await {
            Ok(snapshot) => {
                let summary = self.rule_engine.run(date, &snapshot).await;
                self.metrics
                    .alerts_created_total
                    .inc_by(summary.alerts_created as f64);
                summary.alerts_created
            }
            Err(err) => {
                tracing::warn!("Ops snapshot unavailable for {} — rules skipped: {}", date, err);
                0
            }
        };

        Ok(StepOutcome {
            artifacts_generated: 3,
            ledger_entries_created: journal.entries_created,
            ledger_skipped: journal.skipped,
            anomaly_detected,
            rule_alerts_created,
        })
    }

    /// Close an inclusive date range, sequentially and oldest first.
    ///
    /// Dates that already have a successful run are skipped (without
    /// invoking report generation) when `skip_existing` is set and the run
    /// is not forced. Per-date failures are tallied, not propagated.
    pub async fn backfill(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        force: bool,
        skip_existing: bool,
    ) -> Result<BackfillSummary, AppError> {
        if from > to {
            return Err(AppError::Validation(format!(
                "Backfill range is inverted: {} > {}",
                from, to
            )));
        }

        let days = (to - from).num_days() + 1;
        if days > BACKFILL_MAX_DAYS {
            return Err(AppError::Validation(format!(
                "Backfill range spans {} days (max {})",
                days, BACKFILL_MAX_DAYS
            )));
        }

        let mut summary = BackfillSummary {
            total: 0,
            success: 0,
            failed: 0,
            skipped: 0,
            results: Vec::new(),
        };

        let mut date = from;
        while date <= to {
            summary.total += 1;

            if skip_existing && !force && self.tracker.has_successful(date).await? {
                summary.skipped += 1;
                summary.results.push(BackfillResult {
                    date,
                    status: BackfillStatus::Skipped,
                    error: None,
                });
            } else {
                match self.run(date, force).await {
                    Ok(_) => {
                        summary.success += 1;
                        summary.results.push(BackfillResult {
                            date,
                            status: BackfillStatus::Success,
                            error: None,
                        });
                    }
                    Err(err) => {
                        summary.failed += 1;
                        summary.results.push(BackfillResult {
                            date,
                            status: BackfillStatus::Failed,
                            error: Some(err.to_string()),
                        });
                    }
                }
            }

            date = date.succ_opt().ok_or_else(|| {
                AppError::Validation(format!("Date overflow after {}", date))
            })?;
        }

        tracing::info!(
            "Backfill {}..{} done: {} success, {} failed, {} skipped",
            from,
            to,
            summary.success,
            summary.failed,
            summary.skipped
        );

        Ok(summary)
    }
}

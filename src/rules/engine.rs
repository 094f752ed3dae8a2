//! Rule engine fan-out.
//!
//! Runs every detector concurrently against the same snapshot. Each
//! detector is wrapped in its own task so a failure (or panic) in one
//! never blocks the others; failures are counted and logged, nothing more.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::alerts::AnomalyEnqueuer;

use super::config::RuleConfig;
use super::detectors;
use super::error::RuleError;
use super::types::{OpsSnapshot, RuleFinding, RuleRunSummary};

type Detector = fn(&OpsSnapshot, &RuleConfig) -> Vec<RuleFinding>;

const DETECTORS: &[(&str, Detector)] = &[
    ("low_stock", detectors::low_stock),
    ("negative_stock", detectors::negative_stock),
    ("refund_rate", detectors::refund_rate),
    ("webhook_failures", detectors::webhook_failures),
    ("aged_unfulfilled", detectors::aged_unfulfilled),
    ("order_volume", detectors::order_volume),
    ("payment_failure_rate", detectors::payment_failure_rate),
    ("aov_deviation", detectors::aov_deviation),
];

/// Evaluates all detectors and enqueues their findings.
pub struct AnomalyRuleEngine {
    config: RuleConfig,
    enqueuer: Arc<AnomalyEnqueuer>,
}

impl AnomalyRuleEngine {
    pub fn new(config: RuleConfig, enqueuer: Arc<AnomalyEnqueuer>) -> Self {
        Self { config, enqueuer }
    }

    /// Run every detector concurrently for one business day.
    pub async fn run(&self, date: NaiveDate, snapshot: &OpsSnapshot) -> RuleRunSummary {
        let mut handles = Vec::with_capacity(DETECTORS.len());

        for (name, detect) in DETECTORS.iter().copied() {
            let enqueuer = Arc::clone(&self.enqueuer);
            let config = self.config.clone();
            let snapshot = snapshot.clone();

            let handle = tokio::spawn(async move {
                let findings = detect(&snapshot, &config);
                let mut created = 0usize;
                for finding in &findings {
                    let inserted = enqueuer
                        .enqueue_alert(
                            &finding.kind,
                            date,
                            finding.severity,
                            &finding.message,
                            finding.body.clone(),
                        )
                        .await?;
                    if inserted {
                        created += 1;
                    }
                }
                Ok::<(usize, usize), RuleError>((findings.len(), created))
            });

            handles.push((name, handle));
        }

        let mut summary = RuleRunSummary::default();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok((findings, created))) => {
                    summary.findings += findings;
                    summary.alerts_created += created;
                }
                Ok(Err(err)) => {
                    tracing::error!("Detector {} failed: {}", name, err);
                    summary.detectors_failed += 1;
                }
                Err(join_err) => {
                    tracing::error!("Detector {} panicked: {}", name, join_err);
                    summary.detectors_failed += 1;
                }
            }
        }

        if summary.alerts_created > 0 {
            tracing::info!(
                "Rule engine created {} alerts for {} ({} findings)",
                summary.alerts_created,
                date,
                summary.findings
            );
        }

        summary
    }
}

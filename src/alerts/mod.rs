//! Anomaly alert creation and notification delivery.
//!
//! `enqueuer` owns the DB-unique-constrained alert rows (the only layer with
//! a true dedup guarantee); `webhook` delivers best-effort notifications and
//! records every attempt in the `alert_deliveries` log.

pub mod enqueuer;
pub mod webhook;

pub use enqueuer::AnomalyEnqueuer;
pub use webhook::AlertSink;

use serde::{Deserialize, Serialize};

/// Alert severity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

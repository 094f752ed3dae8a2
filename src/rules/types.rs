//! Core data types for the anomaly rule engine

use serde::{Deserialize, Serialize};

use crate::alerts::Severity;

/// Daily operational snapshot the detectors evaluate.
///
/// Produced by the commerce backend in one call; all counters refer to the
/// business day being closed, baselines are trailing rolling averages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsSnapshot {
    pub stock: Vec<StockLevel>,
    pub orders_count: u32,
    /// Rolling average of daily order volume.
    pub order_volume_baseline: f64,
    pub refund_count: u32,
    pub webhook_failures: u32,
    /// Unfulfilled orders older than the fulfilment SLA.
    pub aged_unfulfilled: u32,
    pub payment_attempts: u32,
    pub payment_failures: u32,
    /// Average order value for the day, in cents.
    pub aov_today: f64,
    /// Rolling average order value, in cents.
    pub aov_baseline: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub variant_id: String,
    pub available: i64,
}

/// One rule hit, ready to be enqueued as an alert.
#[derive(Debug, Clone)]
pub struct RuleFinding {
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    pub body: serde_json::Value,
}

/// Tally of one engine pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleRunSummary {
    pub findings: usize,
    pub alerts_created: usize,
    pub detectors_failed: usize,
}

#[cfg(test)]
impl OpsSnapshot {
    /// A snapshot that trips no detector.
    pub fn calm() -> Self {
        Self {
            stock: vec![StockLevel { variant_id: "v1".to_string(), available: 40 }],
            orders_count: 20,
            order_volume_baseline: 22.0,
            refund_count: 0,
            webhook_failures: 0,
            aged_unfulfilled: 0,
            payment_attempts: 20,
            payment_failures: 0,
            aov_today: 5_000.0,
            aov_baseline: 5_100.0,
        }
    }
}

//! Daily report and evidence value objects.
//!
//! A [`DailyReport`] is produced by the commerce backend for one business
//! day and consumed, immutably, by the journalizer and the anomaly
//! enqueuer. Money is integer minor units (cents) throughout.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Aggregated totals for one business day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub orders: OrderTotals,
    pub payments: PaymentTotals,
    pub refunds: RefundTotals,
    pub anomalies: AnomalySummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTotals {
    pub count: u32,
    pub total_net: i64,
    pub total_fee: i64,
    /// Sum of tax_amount over paid orders for the date.
    pub total_tax: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTotals {
    pub count: u32,
    pub total_amount: i64,
    pub total_fee: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundTotals {
    pub count: u32,
    pub total_amount: i64,
}

/// Reconciliation verdict computed by the report aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub level: AnomalyLevel,
    /// Difference between order totals and captured payments, in cents.
    pub diff: i64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyLevel {
    Ok,
    Warning,
    Critical,
}

/// Raw settlement evidence collected from the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub payments: Vec<PaymentEvidence>,
    pub refunds: Vec<RefundEvidence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvidence {
    pub id: String,
    pub amount: i64,
    pub fee: i64,
    pub captured_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundEvidence {
    pub id: String,
    pub amount: i64,
    pub created_at: String,
}

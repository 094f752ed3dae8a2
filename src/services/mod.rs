//! External collaborator contracts.
//!
//! The pipeline core consumes these traits; `commerce` provides the
//! production HTTP implementations and integration tests substitute mocks.

pub mod commerce;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppError;
use crate::report::{DailyReport, EvidenceBundle};
use crate::rules::OpsSnapshot;

/// Produces the aggregated daily report for a business day.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn generate(&self, date: NaiveDate) -> Result<DailyReport, AppError>;
}

/// Collects raw settlement evidence from the payment provider.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    async fn collect(&self, date: NaiveDate) -> Result<EvidenceBundle, AppError>;
}

/// Produces the operational snapshot the rule engine evaluates.
#[async_trait]
pub trait OpsStatsSource: Send + Sync {
    async fn snapshot(&self, date: NaiveDate) -> Result<OpsSnapshot, AppError>;
}

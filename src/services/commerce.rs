//! HTTP client for the commerce backend.
//!
//! The daily-close service does not own order/payment/stock data; it pulls
//! aggregates from the shop backend's internal API. One client implements
//! all three source contracts plus the maintenance endpoints used by the
//! background cleanup tasks.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use crate::error::AppError;
use crate::report::{DailyReport, EvidenceBundle};
use crate::rules::OpsSnapshot;

use super::{EvidenceSource, OpsStatsSource, ReportSource};

#[derive(Clone)]
pub struct CommerceClient {
    base_url: String,
    http: Client,
}

impl CommerceClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| AppError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "Commerce backend returned HTTP {} for {}",
                response.status(),
                path
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| AppError::Parse(err.to_string()))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|err| AppError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "Commerce backend returned HTTP {} for {}",
                response.status(),
                path
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| AppError::Parse(err.to_string()))
    }

    /// Cancel orders stuck in a pre-payment state. Returns how many were
    /// cancelled.
    pub async fn cancel_stale_orders(&self) -> Result<u64, AppError> {
        let result: MaintenanceResult = self
            .post_json("/internal/maintenance/cancel-stale-orders")
            .await?;
        Ok(result.affected)
    }

    /// Purge shipping quotes past their validity window.
    pub async fn purge_expired_quotes(&self) -> Result<u64, AppError> {
        let result: MaintenanceResult = self
            .post_json("/internal/maintenance/purge-expired-quotes")
            .await?;
        Ok(result.affected)
    }
}

#[derive(Debug, Deserialize)]
struct MaintenanceResult {
    affected: u64,
}

#[async_trait]
impl ReportSource for CommerceClient {
    async fn generate(&self, date: NaiveDate) -> Result<DailyReport, AppError> {
        self.get_json(&format!("/internal/reports/daily/{}", date)).await
    }
}

#[async_trait]
impl EvidenceSource for CommerceClient {
    async fn collect(&self, date: NaiveDate) -> Result<EvidenceBundle, AppError> {
        self.get_json(&format!("/internal/reports/daily/{}/evidence", date))
            .await
    }
}

#[async_trait]
impl OpsStatsSource for CommerceClient {
    async fn snapshot(&self, date: NaiveDate) -> Result<OpsSnapshot, AppError> {
        self.get_json(&format!("/internal/ops/daily/{}", date)).await
    }
}

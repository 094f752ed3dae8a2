//! Close scheduling and background maintenance.
//!
//! Two independent concerns run here:
//! - the daily trigger, which fires the pipeline once per business day at
//!   the configured UTC hour, for the day that just ended;
//! - the maintenance loop (stale-order cancellation, expired-quote purge),
//!   which ticks on its own interval and is never serialized with the
//!   close pipeline.
//!
//! Failures on the scheduled path surface as a critical webhook alert via
//! [`PipelineOrchestrator::run_scheduled`]; a failed tick never takes the
//! loop down. Both loops stop on `Ctrl+C` (SIGINT).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::signal;
use tokio::time;

use crate::pipeline::PipelineOrchestrator;
use crate::services::commerce::CommerceClient;

/// Seconds from `now` until the next `close_hour_utc:00:00 UTC`.
fn seconds_until_close(close_hour_utc: u32, now: DateTime<Utc>) -> u64 {
    let today_close = now
        .date_naive()
        .and_hms_opt(close_hour_utc, 0, 0)
        .map(|dt| dt.and_utc());

    let target = match today_close {
        Some(t) if t > now => t,
        Some(t) => t + chrono::Duration::days(1),
        None => now + chrono::Duration::days(1),
    };

    (target - now).num_seconds().max(1) as u64
}

/// The business day a close fired at `now` covers: the UTC day that just
/// ended.
fn business_day_for(now: DateTime<Utc>) -> NaiveDate {
    let today = now.date_naive();
    today.pred_opt().unwrap_or(today)
}

/// Run the scheduled daily close loop until shutdown.
pub async fn run_daily_close(orchestrator: Arc<PipelineOrchestrator>, close_hour_utc: u32) {
    tracing::info!("Daily close scheduled at {:02}:00 UTC", close_hour_utc);

    loop {
        let wait = seconds_until_close(close_hour_utc, Utc::now());
        tracing::info!("Next scheduled close in {}s", wait);

        tokio::select! {
            _ = time::sleep(Duration::from_secs(wait)) => {
                let date = business_day_for(Utc::now());
                orchestrator.run_scheduled(date).await;
            }

            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown signal received. Stopping close scheduler.");
                break;
            }
        }
    }
}

/// Run the background maintenance loop until shutdown.
pub async fn run_maintenance(client: CommerceClient, interval_seconds: u64) {
    let mut interval = time::interval(Duration::from_secs(interval_seconds));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                maintenance_tick(&client).await;
            }

            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown signal received. Stopping maintenance.");
                break;
            }
        }
    }
}

/// Execute a single maintenance cycle. Extracted for testability.
async fn maintenance_tick(client: &CommerceClient) {
    match client.cancel_stale_orders().await {
        Ok(0) => {}
        Ok(cancelled) => tracing::info!("Cancelled {} stale orders", cancelled),
        Err(err) => tracing::error!("Stale-order cancellation failed — skipping tick: {}", err),
    }

    match client.purge_expired_quotes().await {
        Ok(0) => {}
        Ok(purged) => tracing::info!("Purged {} expired quotes", purged),
        Err(err) => tracing::error!("Quote purge failed — skipping tick: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn seconds_until_close_targets_today_when_before_hour() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 1, 30, 0).unwrap();
        assert_eq!(seconds_until_close(2, now), 30 * 60);
    }

    #[test]
    fn seconds_until_close_rolls_to_tomorrow_when_past_hour() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        assert_eq!(seconds_until_close(2, now), 24 * 60 * 60);

        let just_after = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        assert_eq!(seconds_until_close(2, just_after), 23 * 60 * 60);
    }

    #[test]
    fn business_day_is_utc_yesterday() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        assert_eq!(
            business_day_for(now),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[tokio::test]
    async fn maintenance_tick_calls_both_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal/maintenance/cancel-stale-orders"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"affected": 2}"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/internal/maintenance/purge-expired-quotes"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"affected": 0}"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = CommerceClient::new(server.uri());
        maintenance_tick(&client).await;
    }

    #[tokio::test]
    async fn maintenance_tick_survives_backend_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = CommerceClient::new(server.uri());
        // Both calls fail; the tick must not panic or propagate.
        maintenance_tick(&client).await;
    }
}

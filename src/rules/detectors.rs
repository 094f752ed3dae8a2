//! Threshold detectors.
//!
//! Each detector is a pure function over the [`OpsSnapshot`] and
//! [`RuleConfig`], returning zero or more [`RuleFinding`] values. Per-entity
//! rules (stock) parameterize the dedup kind with the entity id, so each
//! variant gets at most one alert per day instead of one aggregate.

use serde_json::json;

use crate::alerts::Severity;

use super::config::RuleConfig;
use super::types::{OpsSnapshot, RuleFinding};

/// Stock at or below the warning threshold (but not negative — that is the
/// negative-stock rule's territory).
pub fn low_stock(snapshot: &OpsSnapshot, config: &RuleConfig) -> Vec<RuleFinding> {
    snapshot
        .stock
        .iter()
        .filter(|level| level.available >= 0 && level.available <= config.low_stock_warning)
        .map(|level| {
            let severity = if level.available <= config.low_stock_critical {
                Severity::Critical
            } else {
                Severity::Warning
            };
            RuleFinding {
                kind: format!("low_stock_{}", level.variant_id),
                severity,
                message: format!(
                    "Variant {} has {} units left",
                    level.variant_id, level.available
                ),
                body: json!({
                    "variant_id": level.variant_id,
                    "available": level.available,
                    "threshold": config.low_stock_warning,
                }),
            }
        })
        .collect()
}

/// Oversold inventory is always critical.
pub fn negative_stock(snapshot: &OpsSnapshot, _config: &RuleConfig) -> Vec<RuleFinding> {
    snapshot
        .stock
        .iter()
        .filter(|level| level.available < 0)
        .map(|level| RuleFinding {
            kind: format!("negative_stock_{}", level.variant_id),
            severity: Severity::Critical,
            message: format!(
                "Variant {} is oversold ({} units)",
                level.variant_id, level.available
            ),
            body: json!({
                "variant_id": level.variant_id,
                "available": level.available,
            }),
        })
        .collect()
}

pub fn refund_rate(snapshot: &OpsSnapshot, config: &RuleConfig) -> Vec<RuleFinding> {
    if snapshot.orders_count == 0 {
        return Vec::new();
    }

    let rate = snapshot.refund_count as f64 / snapshot.orders_count as f64;
    let severity = if rate >= config.refund_rate_critical {
        Severity::Critical
    } else if rate >= config.refund_rate_warning {
        Severity::Warning
    } else {
        return Vec::new();
    };

    vec![RuleFinding {
        kind: "refund_rate_spike".to_string(),
        severity,
        message: format!(
            "Refund rate {:.1}% ({} of {} orders)",
            rate * 100.0,
            snapshot.refund_count,
            snapshot.orders_count
        ),
        body: json!({
            "refunds": snapshot.refund_count,
            "orders": snapshot.orders_count,
            "rate": rate,
        }),
    }]
}

pub fn webhook_failures(snapshot: &OpsSnapshot, config: &RuleConfig) -> Vec<RuleFinding> {
    let count = snapshot.webhook_failures;
    let severity = if count >= config.webhook_failures_critical {
        Severity::Critical
    } else if count >= config.webhook_failures_warning {
        Severity::Warning
    } else {
        return Vec::new();
    };

    vec![RuleFinding {
        kind: "webhook_failure_spike".to_string(),
        severity,
        message: format!("{} webhook deliveries failed today", count),
        body: json!({ "failures": count }),
    }]
}

pub fn aged_unfulfilled(snapshot: &OpsSnapshot, config: &RuleConfig) -> Vec<RuleFinding> {
    let count = snapshot.aged_unfulfilled;
    let severity = if count >= config.aged_unfulfilled_critical {
        Severity::Critical
    } else if count >= config.aged_unfulfilled_warning {
        Severity::Warning
    } else {
        return Vec::new();
    };

    vec![RuleFinding {
        kind: "aged_unfulfilled_orders".to_string(),
        severity,
        message: format!("{} orders past the fulfilment SLA", count),
        body: json!({ "aged_unfulfilled": count }),
    }]
}

/// Order volume far above the rolling average. Skipped until the baseline
/// has enough history to be meaningful.
pub fn order_volume(snapshot: &OpsSnapshot, config: &RuleConfig) -> Vec<RuleFinding> {
    if snapshot.order_volume_baseline < config.min_volume_baseline {
        return Vec::new();
    }

    let ratio = snapshot.orders_count as f64 / snapshot.order_volume_baseline;
    let severity = if ratio >= config.volume_spike_critical_ratio {
        Severity::Critical
    } else if ratio >= config.volume_spike_warning_ratio {
        Severity::Warning
    } else {
        return Vec::new();
    };

    vec![RuleFinding {
        kind: "order_volume_spike".to_string(),
        severity,
        message: format!(
            "Order volume {} is {:.1}x the rolling average",
            snapshot.orders_count, ratio
        ),
        body: json!({
            "orders": snapshot.orders_count,
            "baseline": snapshot.order_volume_baseline,
            "ratio": ratio,
        }),
    }]
}

pub fn payment_failure_rate(snapshot: &OpsSnapshot, config: &RuleConfig) -> Vec<RuleFinding> {
    if snapshot.payment_attempts == 0 {
        return Vec::new();
    }

    let rate = snapshot.payment_failures as f64 / snapshot.payment_attempts as f64;
    let severity = if rate >= config.payment_failure_critical {
        Severity::Critical
    } else if rate >= config.payment_failure_warning {
        Severity::Warning
    } else {
        return Vec::new();
    };

    vec![RuleFinding {
        kind: "payment_failure_rate".to_string(),
        severity,
        message: format!(
            "Payment failure rate {:.1}% ({} of {} attempts)",
            rate * 100.0,
            snapshot.payment_failures,
            snapshot.payment_attempts
        ),
        body: json!({
            "failures": snapshot.payment_failures,
            "attempts": snapshot.payment_attempts,
            "rate": rate,
        }),
    }]
}

/// Average order value drifting away from the rolling average in either
/// direction.
pub fn aov_deviation(snapshot: &OpsSnapshot, config: &RuleConfig) -> Vec<RuleFinding> {
    if snapshot.orders_count == 0 || snapshot.aov_baseline <= 0.0 {
        return Vec::new();
    }

    let deviation = (snapshot.aov_today - snapshot.aov_baseline).abs() / snapshot.aov_baseline;
    let severity = if deviation >= config.aov_deviation_critical {
        Severity::Critical
    } else if deviation >= config.aov_deviation_warning {
        Severity::Warning
    } else {
        return Vec::new();
    };

    vec![RuleFinding {
        kind: "aov_deviation".to_string(),
        severity,
        message: format!(
            "Average order value {:.0} deviates {:.0}% from baseline {:.0}",
            snapshot.aov_today,
            deviation * 100.0,
            snapshot.aov_baseline
        ),
        body: json!({
            "aov_today": snapshot.aov_today,
            "aov_baseline": snapshot.aov_baseline,
            "deviation": deviation,
        }),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::StockLevel;

    fn config() -> RuleConfig {
        RuleConfig::default()
    }

    #[test]
    fn calm_snapshot_trips_nothing() {
        let snapshot = OpsSnapshot::calm();
        let config = config();

        assert!(low_stock(&snapshot, &config).is_empty());
        assert!(negative_stock(&snapshot, &config).is_empty());
        assert!(refund_rate(&snapshot, &config).is_empty());
        assert!(webhook_failures(&snapshot, &config).is_empty());
        assert!(aged_unfulfilled(&snapshot, &config).is_empty());
        assert!(order_volume(&snapshot, &config).is_empty());
        assert!(payment_failure_rate(&snapshot, &config).is_empty());
        assert!(aov_deviation(&snapshot, &config).is_empty());
    }

    #[test]
    fn low_stock_emits_one_finding_per_variant() {
        let mut snapshot = OpsSnapshot::calm();
        snapshot.stock = vec![
            StockLevel { variant_id: "v1".to_string(), available: 4 },
            StockLevel { variant_id: "v2".to_string(), available: 1 },
            StockLevel { variant_id: "v3".to_string(), available: 30 },
        ];

        let findings = low_stock(&snapshot, &config());
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind, "low_stock_v1");
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[1].kind, "low_stock_v2");
        assert_eq!(findings[1].severity, Severity::Critical);
    }

    #[test]
    fn negative_stock_is_critical_and_excluded_from_low_stock() {
        let mut snapshot = OpsSnapshot::calm();
        snapshot.stock = vec![StockLevel { variant_id: "v9".to_string(), available: -3 }];

        let negative = negative_stock(&snapshot, &config());
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].kind, "negative_stock_v9");
        assert_eq!(negative[0].severity, Severity::Critical);

        assert!(low_stock(&snapshot, &config()).is_empty());
    }

    #[test]
    fn refund_rate_tiers_by_distance_past_threshold() {
        let mut snapshot = OpsSnapshot::calm();
        snapshot.orders_count = 100;

        snapshot.refund_count = 6;
        let warning = refund_rate(&snapshot, &config());
        assert_eq!(warning[0].severity, Severity::Warning);

        snapshot.refund_count = 12;
        let critical = refund_rate(&snapshot, &config());
        assert_eq!(critical[0].severity, Severity::Critical);

        snapshot.refund_count = 2;
        assert!(refund_rate(&snapshot, &config()).is_empty());
    }

    #[test]
    fn refund_rate_skips_zero_order_days() {
        let mut snapshot = OpsSnapshot::calm();
        snapshot.orders_count = 0;
        snapshot.refund_count = 3;
        assert!(refund_rate(&snapshot, &config()).is_empty());
    }

    #[test]
    fn order_volume_skips_thin_baseline() {
        let mut snapshot = OpsSnapshot::calm();
        snapshot.order_volume_baseline = 2.0;
        snapshot.orders_count = 50;
        assert!(order_volume(&snapshot, &config()).is_empty());

        snapshot.order_volume_baseline = 10.0;
        let findings = order_volume(&snapshot, &config());
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn payment_failure_rate_tiers() {
        let mut snapshot = OpsSnapshot::calm();
        snapshot.payment_attempts = 100;
        snapshot.payment_failures = 7;
        assert_eq!(
            payment_failure_rate(&snapshot, &config())[0].severity,
            Severity::Warning
        );

        snapshot.payment_failures = 20;
        assert_eq!(
            payment_failure_rate(&snapshot, &config())[0].severity,
            Severity::Critical
        );
    }

    #[test]
    fn aov_deviation_fires_in_both_directions() {
        let mut snapshot = OpsSnapshot::calm();
        snapshot.aov_baseline = 10_000.0;

        snapshot.aov_today = 14_000.0;
        assert_eq!(aov_deviation(&snapshot, &config())[0].severity, Severity::Warning);

        snapshot.aov_today = 3_000.0;
        assert_eq!(aov_deviation(&snapshot, &config())[0].severity, Severity::Critical);
    }

    #[test]
    fn webhook_and_unfulfilled_counters_tier() {
        let mut snapshot = OpsSnapshot::calm();
        snapshot.webhook_failures = 6;
        snapshot.aged_unfulfilled = 25;

        assert_eq!(webhook_failures(&snapshot, &config())[0].severity, Severity::Warning);
        assert_eq!(aged_unfulfilled(&snapshot, &config())[0].severity, Severity::Critical);
    }
}

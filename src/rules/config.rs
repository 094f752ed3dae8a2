//! Threshold configuration for the rule engine

/// Static thresholds for all detectors.
///
/// Warning fires at the first threshold, critical when the metric lands
/// past the second. Ratio-based rules are skipped until the baseline has
/// enough history (`min_volume_baseline`).
#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub low_stock_warning: i64,
    pub low_stock_critical: i64,
    pub refund_rate_warning: f64,
    pub refund_rate_critical: f64,
    pub webhook_failures_warning: u32,
    pub webhook_failures_critical: u32,
    pub aged_unfulfilled_warning: u32,
    pub aged_unfulfilled_critical: u32,
    pub volume_spike_warning_ratio: f64,
    pub volume_spike_critical_ratio: f64,
    pub payment_failure_warning: f64,
    pub payment_failure_critical: f64,
    pub aov_deviation_warning: f64,
    pub aov_deviation_critical: f64,
    pub min_volume_baseline: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            low_stock_warning: 5,
            low_stock_critical: 2,
            refund_rate_warning: 0.05,
            refund_rate_critical: 0.10,
            webhook_failures_warning: 5,
            webhook_failures_critical: 20,
            aged_unfulfilled_warning: 5,
            aged_unfulfilled_critical: 20,
            volume_spike_warning_ratio: 2.0,
            volume_spike_critical_ratio: 3.0,
            payment_failure_warning: 0.05,
            payment_failure_critical: 0.15,
            aov_deviation_warning: 0.30,
            aov_deviation_critical: 0.60,
            min_volume_baseline: 5.0,
        }
    }
}

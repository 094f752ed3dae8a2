//! Anomaly Rule Engine
//!
//! A fixed set of independent threshold detectors evaluated against a daily
//! operational snapshot. Each detector emits deduplicated alerts through the
//! [`crate::alerts::AnomalyEnqueuer`] under its own rule-specific kind.

pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod types;

pub use config::RuleConfig;
pub use engine::AnomalyRuleEngine;
pub use error::RuleError;
pub use types::*;

//! Error types for rule engine operations

use thiserror::Error;

/// Errors from an individual detector pass.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Ops snapshot unavailable: {0}")]
    Snapshot(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Detector panicked: {0}")]
    Panicked(String),
}

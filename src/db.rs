//! SQLite pool construction and schema migration.
//!
//! [`create_pool`] is the single entry point used by `main.rs` and by every
//! test that needs a database (`create_pool("sqlite::memory:")`). The schema
//! is applied idempotently on every startup — all statements are
//! `CREATE ... IF NOT EXISTS`.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS daily_close_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        close_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'running',
        started_at TEXT NOT NULL,
        completed_at TEXT,
        forced INTEGER NOT NULL DEFAULT 0,
        artifacts_generated INTEGER NOT NULL DEFAULT 0,
        ledger_entries_created INTEGER NOT NULL DEFAULT 0,
        anomaly_detected INTEGER NOT NULL DEFAULT 0,
        error_message TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_daily_close_runs_date
        ON daily_close_runs(close_date)",
    "CREATE TABLE IF NOT EXISTS ledger_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ref_type TEXT NOT NULL,
        ref_id TEXT NOT NULL,
        account_id TEXT NOT NULL,
        debit INTEGER NOT NULL DEFAULT 0,
        credit INTEGER NOT NULL DEFAULT 0,
        memo TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(ref_type, ref_id, account_id, debit, credit, memo)
    )",
    "CREATE INDEX IF NOT EXISTS idx_ledger_entries_ref
        ON ledger_entries(ref_type, ref_id)",
    "CREATE TABLE IF NOT EXISTS anomaly_alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        alert_date TEXT NOT NULL,
        severity TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(kind, alert_date)
    )",
    "CREATE TABLE IF NOT EXISTS alert_deliveries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        severity TEXT NOT NULL,
        webhook_url TEXT NOT NULL,
        delivered INTEGER NOT NULL,
        triggered_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ref_type TEXT NOT NULL,
        ref_id TEXT NOT NULL,
        path TEXT NOT NULL,
        content_type TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(ref_type, ref_id, path)
    )",
];

/// Connect to SQLite and apply the schema.
///
/// In-memory databases get a single-connection pool so every query sees
/// the same database instance.
pub async fn create_pool(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }

    Ok(pool)
}

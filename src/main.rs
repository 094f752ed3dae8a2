use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;

use daily_close::alerts::{AlertSink, AnomalyEnqueuer};
use daily_close::api;
use daily_close::artifacts::{DocumentIndex, FsBlobStore};
use daily_close::cli::Cli;
use daily_close::config::Config;
use daily_close::db;
use daily_close::ledger::LedgerJournalizer;
use daily_close::logging::init_logging;
use daily_close::metrics::AppMetrics;
use daily_close::pipeline::PipelineOrchestrator;
use daily_close::rules::{AnomalyRuleEngine, RuleConfig};
use daily_close::runs::RunTracker;
use daily_close::scheduler;
use daily_close::services::commerce::CommerceClient;

/// Maintenance tasks (stale orders, expired quotes) tick every 15 minutes.
const MAINTENANCE_INTERVAL_SECONDS: u64 = 900;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::from_env().unwrap_or_else(|err| {
        tracing::error!("Config error: {}", err);
        std::process::exit(1);
    });

    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }
    if let Some(commerce_api_url) = cli.commerce_api_url {
        config.commerce_api_url = commerce_api_url;
    }
    if let Some(artifact_root) = cli.artifact_root {
        config.artifact_root = artifact_root;
    }
    if let Some(close_hour) = cli.close_hour {
        config.close_hour_utc = close_hour;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing::info!("Service started with config: {:?}", config);

    let pool = db::create_pool(&config.database_url).await.unwrap_or_else(|err| {
        tracing::error!("Could not open database: {}", err);
        std::process::exit(1);
    });

    let metrics = Arc::new(AppMetrics::new().unwrap_or_else(|err| {
        tracing::error!("Could not register metrics: {}", err);
        std::process::exit(1);
    }));

    let commerce = CommerceClient::new(config.commerce_api_url.clone());
    let sink = Arc::new(AlertSink::new(pool.clone(), config.alert_webhook_url.clone()));
    let enqueuer = Arc::new(AnomalyEnqueuer::new(pool.clone(), Arc::clone(&sink)));

    let orchestrator = Arc::new(PipelineOrchestrator {
        tracker: Arc::new(RunTracker::new(pool.clone())),
        journalizer: Arc::new(LedgerJournalizer::new(pool.clone())),
        enqueuer: Arc::clone(&enqueuer),
        rule_engine: Arc::new(AnomalyRuleEngine::new(RuleConfig::default(), enqueuer)),
        report_source: Arc::new(commerce.clone()),
        evidence_source: Arc::new(commerce.clone()),
        ops_source: Arc::new(commerce.clone()),
        blob_store: Arc::new(FsBlobStore::new(config.artifact_root.clone())),
        document_index: Arc::new(DocumentIndex::new(pool.clone())),
        sink,
        metrics,
    });

    tokio::spawn(scheduler::run_daily_close(
        Arc::clone(&orchestrator),
        config.close_hour_utc,
    ));
    tokio::spawn(scheduler::run_maintenance(
        commerce,
        MAINTENANCE_INTERVAL_SECONDS,
    ));

    let app = api::router(Arc::clone(&orchestrator));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|err| {
        tracing::error!("Could not bind {}: {}", addr, err);
        std::process::exit(1);
    });

    tracing::info!("Listening on {}", addr);

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", err);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Could not install Ctrl+C handler");
    }
}

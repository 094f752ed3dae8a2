use clap::Parser;

/// Daily close service CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "daily-close",
    version,
    about = "Closes out a business day: ledger posting, anomaly alerts, audit trail"
)]
pub struct Cli {
    /// SQLite database URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// Commerce backend API base URL
    #[arg(long)]
    pub commerce_api_url: Option<String>,

    /// Directory artifacts are published under
    #[arg(long)]
    pub artifact_root: Option<String>,

    /// Hour of day (UTC) the scheduled close fires
    #[arg(long)]
    pub close_hour: Option<u32>,

    /// HTTP listen port
    #[arg(long)]
    pub port: Option<u16>,
}

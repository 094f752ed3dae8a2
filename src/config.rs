use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub commerce_api_url: String,
    pub artifact_root: String,
    pub alert_webhook_url: Option<String>,
    pub close_hour_utc: u32,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is required")?;

        let commerce_api_url =
            env::var("COMMERCE_API_URL").map_err(|_| "COMMERCE_API_URL is required")?;

        let artifact_root =
            env::var("ARTIFACT_ROOT").map_err(|_| "ARTIFACT_ROOT is required")?;

        // Optional: when unset, anomaly notifications are logged but not delivered.
        let alert_webhook_url = env::var("ALERT_WEBHOOK_URL").ok();

        let close_hour_utc = env::var("CLOSE_HOUR_UTC")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<u32>()
            .map_err(|_| "CLOSE_HOUR_UTC must be a valid number")?;
        if close_hour_utc > 23 {
            return Err(format!("CLOSE_HOUR_UTC must be 0-23, got {}", close_hour_utc));
        }

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| "PORT must be a valid number")?;

        Ok(Self {
            database_url,
            commerce_api_url,
            artifact_root,
            alert_webhook_url,
            close_hour_utc,
            port,
        })
    }
}

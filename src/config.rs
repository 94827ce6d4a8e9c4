use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub sweep_interval_secs: u64,
    pub event_webhook_url: Option<String>,
    pub event_webhook_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "scheduler.db".to_string()),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(300),
            event_webhook_url: env::var("EVENT_WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            event_webhook_secret: env::var("EVENT_WEBHOOK_SECRET")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }
}

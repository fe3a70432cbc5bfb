use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub utc_offset_hours: i8,
    pub reminder_hour: u8,
    pub created_delay_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            utc_offset_hours: 0,
            reminder_hour: 9,
            created_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub storage_timeout_ms: u64,
    pub notify: NotifyConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = NotifyConfig::default();
        let notify = NotifyConfig {
            enabled: env_or("NOTIFICATIONS_ENABLED", defaults.enabled),
            utc_offset_hours: env_or("NOTIFY_UTC_OFFSET_HOURS", defaults.utc_offset_hours),
            reminder_hour: env_or("NOTIFY_REMINDER_HOUR", defaults.reminder_hour),
            created_delay_secs: env_or("NOTIFY_CREATED_DELAY_SECS", defaults.created_delay_secs),
        };
        anyhow::ensure!(notify.reminder_hour < 24, "NOTIFY_REMINDER_HOUR must be 0..=23");
        anyhow::ensure!(
            (-23..=23).contains(&notify.utc_offset_hours),
            "NOTIFY_UTC_OFFSET_HOURS must be -23..=23"
        );

        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse::<u16>().context("APP_PORT")?,
            Err(_) => 8080,
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            storage_timeout_ms: env_or("STORAGE_TIMEOUT_MS", 5000),
            notify,
        })
    }
}

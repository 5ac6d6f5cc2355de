use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Setup sessions fall back to process memory when unset
    pub redis: Option<RedisConfig>,
    pub kafka: KafkaConfig,
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Connection attempts at startup before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_connect_retry")]
    pub connect_retry_secs: u64,
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_connect_retry() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_alert_topic")]
    pub alert_topic: String,
}

fn default_alert_topic() -> String {
    "farewatch.price-alerts".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Base URL of the headless browser sidecar
    pub sidecar_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    90
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub check_interval_minutes: u64,
    pub run_on_startup: bool,
    pub attempt_timeout_secs: u64,
    pub retry_delay_secs: u64,
    pub plausibility_floor: i32,
    pub plausibility_ratio: f64,
    pub currency: String,
    pub diagnostics_dir: Option<PathBuf>,
    pub setup_session_ttl_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: 60,
            run_on_startup: true,
            attempt_timeout_secs: 60,
            retry_delay_secs: 5,
            plausibility_floor: 100,
            plausibility_ratio: 0.65,
            currency: "BRL".to_string(),
            diagnostics_dir: None,
            setup_session_ttl_secs: 600,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `FAREWATCH__MONITOR__CHECK_INTERVAL_MINUTES=30`
            .add_source(config::Environment::with_prefix("FAREWATCH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(text: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_monitor_defaults_apply() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres://localhost/farewatch"

            [kafka]
            brokers = "localhost:9092"

            [extraction]
            sidecar_url = "http://localhost:3100"
            "#,
        );

        assert!(config.redis.is_none());
        assert_eq!(config.database.connect_attempts, 5);
        assert_eq!(config.database.connect_retry_secs, 5);
        assert_eq!(config.kafka.alert_topic, "farewatch.price-alerts");
        assert_eq!(config.extraction.request_timeout_secs, 90);
        assert_eq!(config.monitor.attempt_timeout_secs, 60);
        assert_eq!(config.monitor.plausibility_floor, 100);
        assert_eq!(config.monitor.currency, "BRL");
    }

    #[test]
    fn test_partial_monitor_section() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres://localhost/farewatch"

            [redis]
            url = "redis://localhost:6379"

            [kafka]
            brokers = "localhost:9092"

            [extraction]
            sidecar_url = "http://localhost:3100"

            [monitor]
            check_interval_minutes = 15
            diagnostics_dir = "/tmp/farewatch"
            "#,
        );

        assert_eq!(config.monitor.check_interval_minutes, 15);
        assert_eq!(config.monitor.retry_delay_secs, 5);
        assert_eq!(config.monitor.diagnostics_dir, Some(PathBuf::from("/tmp/farewatch")));
        assert!(config.redis.is_some());
    }
}

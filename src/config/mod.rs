use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    pub endpoint: String,
    pub pings_per_second: u64,
    pub ping_seconds: u64,
    pub report_delay_secs: u64,
}

impl ProbeConfig {
    pub fn total_pings(&self) -> u64 {
        self.pings_per_second * self.ping_seconds
    }

    pub fn ping_period(&self) -> Duration {
        Duration::from_millis((1000 / self.pings_per_second.max(1)).max(1))
    }

    pub fn report_delay(&self) -> Duration {
        Duration::from_secs(self.report_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    pub connect_timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub probe: ProbeConfig,
    pub connection: ConnectionConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default values
            .set_default("environment", "development")?
            .set_default("probe.endpoint", "ws://localhost:8080")?
            .set_default("probe.pings_per_second", 20)?
            .set_default("probe.ping_seconds", 20)?
            .set_default("probe.report_delay_secs", 10)?
            .set_default("connection.connect_timeout_ms", 1000)?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_PROBE__ENDPOINT=ws://10.0.0.1:9000` sets `Settings.probe.endpoint`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    #[cfg(test)]
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("environment", "test")?
            .set_default("probe.endpoint", "ws://localhost:8080")?
            .set_default("probe.pings_per_second", 20)?
            .set_default("probe.ping_seconds", 20)?
            .set_default("probe.report_delay_secs", 10)?
            .set_default("connection.connect_timeout_ms", 1000)?
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

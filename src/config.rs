//! Configuration management for the channel token service.
//!
//! Settings come from an optional `config.yaml` and are overridden by
//! `TOKEN_SERVICE_*` environment variables. Server credentials are loaded
//! separately, see [`crate::credentials`].

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};

/// Application configuration settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Port number the server will listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8080
}

/// Logging and trace export settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Level for this service's own events.
    pub level: LogLevel,
    /// Level for events emitted by axum.
    pub axum_level: LogLevel,
    pub format: LoggingFormat,
    /// Export spans over OTLP (gRPC). Endpoint is taken from the standard
    /// `OTEL_EXPORTER_OTLP_*` variables.
    pub otlp_enabled: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            axum_level: LogLevel::Info,
            format: LoggingFormat::Pretty,
            otlp_enabled: false,
            service_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFormat {
    Json,
    #[default]
    Pretty,
}

/// Loads settings from `config.yaml` (if present) and the environment.
pub fn load_config() -> Result<Settings, config::ConfigError> {
    load_config_from(environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("TOKEN_SERVICE")
        .prefix_separator("_")
        .separator("__")
}

fn load_config_from(env: config::Environment) -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .add_source(env)
        .build()?
        .try_deserialize::<Settings>()
}

use chrono::{DateTime, TimeDelta, Utc};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub gateway: GatewayConfig,
    pub sweep: SweepConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let gateway_url = env::var("GATEWAY_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        let api_key = env::var("GATEWAY_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let timeout_secs = env::var("GATEWAY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout)?;

        let threshold_days = env::var("SWEEP_THRESHOLD_DAYS")
            .unwrap_or_else(|_| SweepConfig::DEFAULT_THRESHOLD_DAYS.to_string())
            .parse::<i64>()
            .ok()
            .filter(|days| SweepConfig::THRESHOLD_RANGE.contains(days))
            .ok_or(ConfigError::InvalidThreshold)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: environment != AppEnvironment::Production,
            },
            gateway: GatewayConfig {
                url: gateway_url,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            },
            sweep: SweepConfig { threshold_days },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
}

/// Connection settings for the hosted data gateway. Without a URL the service
/// falls back to an in-memory store.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Delinquency sweep policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    pub threshold_days: i64,
}

impl SweepConfig {
    pub const DEFAULT_THRESHOLD_DAYS: i64 = 90;
    pub const MAX_THRESHOLD_DAYS: i64 = 36_500;
    pub const THRESHOLD_RANGE: RangeInclusive<i64> = 1..=Self::MAX_THRESHOLD_DAYS;

    /// `now` minus the threshold. Fails for thresholds outside [`Self::THRESHOLD_RANGE`].
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
        if !Self::THRESHOLD_RANGE.contains(&self.threshold_days) {
            return Err(ConfigError::InvalidThreshold);
        }
        TimeDelta::try_days(self.threshold_days)
            .and_then(|threshold| now.checked_sub_signed(threshold))
            .ok_or(ConfigError::InvalidThreshold)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            threshold_days: Self::DEFAULT_THRESHOLD_DAYS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "GATEWAY_TIMEOUT_SECS must be a positive number of seconds")
            }
            ConfigError::InvalidThreshold => {
                write!(
                    f,
                    "SWEEP_THRESHOLD_DAYS must be between 1 and {} days",
                    SweepConfig::MAX_THRESHOLD_DAYS
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

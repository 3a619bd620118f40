use crate::scoring::{LookupGuard, ScoringPolicy, SuppressionMode, WindowMode};
use crate::speed_limits::{HereSpeedLimitClient, LookupError, HERE_REVGEOCODE_URL};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
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
    pub scoring: ScoringConfig,
    pub speed_limits: SpeedLimitConfig,
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

        let scoring = ScoringConfig {
            full_month: env_flag("SCORE_FULL_MONTH", false)?,
            use_speed_lookup: env_flag("SCORE_USE_SPEED_LOOKUP", false)?,
            default_speed_limit: env_number("SCORE_DEFAULT_SPEED_LIMIT", 60)?,
            lookup_confirm_threshold: env_number("SCORE_LOOKUP_CONFIRM_THRESHOLD", 10)?,
            suppression: match env::var("SCORE_SUPPRESSION") {
                Ok(value) => parse_suppression(&value)?,
                Err(_) => SuppressionMode::PredecessorDelta,
            },
        };

        let speed_limits = SpeedLimitConfig {
            api_key: env::var("HERE_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            base_url: env::var("HERE_BASE_URL").unwrap_or_else(|_| HERE_REVGEOCODE_URL.to_string()),
            timeout: Duration::from_secs(env_number("HERE_TIMEOUT_SECS", 10)?),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scoring,
            speed_limits,
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
}

/// Scoring defaults; command line flags may override them per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringConfig {
    pub full_month: bool,
    pub use_speed_lookup: bool,
    pub default_speed_limit: u32,
    pub lookup_confirm_threshold: usize,
    pub suppression: SuppressionMode,
}

impl ScoringConfig {
    pub fn policy(&self, lookups_confirmed: bool) -> ScoringPolicy {
        ScoringPolicy {
            window_mode: WindowMode::from_full_month(self.full_month),
            use_external_lookup: self.use_speed_lookup,
            lookups_confirmed,
            default_speed_limit: self.default_speed_limit,
            lookup_guard: LookupGuard {
                confirm_threshold: self.lookup_confirm_threshold,
            },
            suppression: self.suppression,
        }
    }
}

/// HERE reverse geocoding access.
#[derive(Debug, Clone)]
pub struct SpeedLimitConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl SpeedLimitConfig {
    /// `None` when no API key is configured.
    pub fn client(&self) -> Result<Option<HereSpeedLimitClient>, LookupError> {
        self.api_key
            .as_deref()
            .map(|key| HereSpeedLimitClient::new(key, self.base_url.as_str(), self.timeout))
            .transpose()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFlag { name: &'static str, value: String },
    InvalidNumber { name: &'static str, value: String },
    InvalidSuppression(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false, got '{value}'")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidSuppression(value) => write!(
                f,
                "SCORE_SUPPRESSION must be 'predecessor' or 'min-gap', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidSuppression(_) => None,
        }
    }
}

fn env_flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { name, value }),
    }
}

fn env_number<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

pub fn parse_suppression(value: &str) -> Result<SuppressionMode, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "predecessor" | "predecessor-delta" | "" => Ok(SuppressionMode::PredecessorDelta),
        "min-gap" | "minimum-gap" => Ok(SuppressionMode::MinimumGap),
        _ => Err(ConfigError::InvalidSuppression(value.to_string())),
    }
}

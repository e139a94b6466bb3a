//! Client Configuration Settings
//!
//! Configuration types for the stream client, loaded from environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

/// Gateway environment (demo vs live).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Demo environment (simulated accounts).
    #[default]
    Demo,
    /// Live environment (real money).
    Live,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "LIVE" => Self::Live,
            _ => Self::Demo,
        }
    }

    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Live => "live",
        }
    }

    /// Gateway hostname for this environment.
    #[must_use]
    pub const fn gateway_host(&self) -> &'static str {
        match self {
            Self::Demo => "demo.ctraderapi.com",
            Self::Live => "live.ctraderapi.com",
        }
    }
}

/// Connection lifecycle settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Gateway port.
    pub port: u16,
    /// Outbound heartbeat interval.
    pub heartbeat_interval: Duration,
    /// Idle window after which the connection is considered dead.
    pub read_idle_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Capacity of the outward event channel.
    pub event_channel_capacity: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: 5035,
            heartbeat_interval: Duration::from_secs(10),
            read_idle_timeout: Duration::from_secs(30),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0, // Unlimited
            event_channel_capacity: 10_000,
        }
    }
}

/// Credential refresh settings.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// OAuth token endpoint URL.
    pub token_url: String,
    /// Per-request timeout for the token endpoint.
    pub request_timeout: Duration,
    /// Maximum exchange attempts per refresh.
    pub max_attempts: u32,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            token_url: "https://openapi.ctrader.com/apps/token".to_string(),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway environment.
    pub environment: Environment,
    /// Path of the JSON credential document.
    pub credentials_path: PathBuf,
    /// Trading account id, when pinned via configuration.
    pub account_id: Option<i64>,
    /// Symbol names to subscribe to (resolved against the symbol list).
    pub symbols: Vec<String>,
    /// Connection lifecycle settings.
    pub connection: ConnectionSettings,
    /// Credential refresh settings.
    pub refresh: RefreshSettings,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing
    /// or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials_path = std::env::var("CTRADER_CREDENTIALS_PATH")
            .map_err(|_| ConfigError::MissingEnvVar("CTRADER_CREDENTIALS_PATH".to_string()))?;
        if credentials_path.is_empty() {
            return Err(ConfigError::EmptyValue("CTRADER_CREDENTIALS_PATH".to_string()));
        }

        let environment = std::env::var("CTRADER_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let account_id = std::env::var("CTRADER_ACCOUNT_ID")
            .ok()
            .and_then(|v| v.parse().ok());

        let symbols = std::env::var("CTRADER_SYMBOLS")
            .map(|s| {
                s.split(',')
                    .map(|sym| sym.trim().to_string())
                    .filter(|sym| !sym.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let connection = ConnectionSettings {
            port: parse_env_u16("CTRADER_PORT", ConnectionSettings::default().port),
            heartbeat_interval: parse_env_duration_secs(
                "CTRADER_HEARTBEAT_INTERVAL_SECS",
                ConnectionSettings::default().heartbeat_interval,
            ),
            read_idle_timeout: parse_env_duration_secs(
                "CTRADER_READ_IDLE_TIMEOUT_SECS",
                ConnectionSettings::default().read_idle_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "CTRADER_RECONNECT_DELAY_INITIAL_MS",
                ConnectionSettings::default().reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "CTRADER_RECONNECT_DELAY_MAX_SECS",
                ConnectionSettings::default().reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "CTRADER_RECONNECT_DELAY_MULTIPLIER",
                ConnectionSettings::default().reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "CTRADER_MAX_RECONNECT_ATTEMPTS",
                ConnectionSettings::default().max_reconnect_attempts,
            ),
            event_channel_capacity: parse_env_usize(
                "CTRADER_EVENT_CHANNEL_CAPACITY",
                ConnectionSettings::default().event_channel_capacity,
            ),
        };

        let refresh = RefreshSettings {
            token_url: std::env::var("CTRADER_TOKEN_URL")
                .unwrap_or_else(|_| RefreshSettings::default().token_url),
            request_timeout: parse_env_duration_secs(
                "CTRADER_TOKEN_TIMEOUT_SECS",
                RefreshSettings::default().request_timeout,
            ),
            max_attempts: parse_env_u32(
                "CTRADER_REFRESH_MAX_ATTEMPTS",
                RefreshSettings::default().max_attempts,
            ),
        };

        Ok(Self {
            environment,
            credentials_path: PathBuf::from(credentials_path),
            account_id,
            symbols,
            connection,
            refresh,
        })
    }

    /// Gateway hostname for the configured environment.
    #[must_use]
    pub const fn gateway_host(&self) -> &'static str {
        self.environment.gateway_host()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing() {
        assert_eq!(
            Environment::from_str_case_insensitive("live"),
            Environment::Live
        );
        assert_eq!(
            Environment::from_str_case_insensitive("LIVE"),
            Environment::Live
        );
        assert_eq!(
            Environment::from_str_case_insensitive("demo"),
            Environment::Demo
        );
        assert_eq!(
            Environment::from_str_case_insensitive("unknown"),
            Environment::Demo
        );
    }

    #[test]
    fn environment_hosts() {
        assert_eq!(Environment::Demo.gateway_host(), "demo.ctraderapi.com");
        assert_eq!(Environment::Live.gateway_host(), "live.ctraderapi.com");
        assert!(Environment::Live.is_live());
        assert!(!Environment::Demo.is_live());
    }

    #[test]
    fn connection_settings_defaults() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.port, 5035);
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(settings.read_idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.reconnect_delay_initial, Duration::from_millis(500));
        assert_eq!(settings.reconnect_delay_max, Duration::from_secs(30));
        assert!((settings.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(settings.max_reconnect_attempts, 0);
    }

    #[test]
    fn refresh_settings_defaults() {
        let settings = RefreshSettings::default();
        assert_eq!(settings.max_attempts, 3);
        assert!(settings.token_url.starts_with("https://"));
    }
}

//! Gateway Configuration Settings
//!
//! Configuration types for the gateway, loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::application::services::{DEFAULT_GATEWAY_NAME, GatewayOptions};

/// Default contract table file.
pub const DEFAULT_CONTRACT_STORE: &str = "ib_contract_data.json";

/// Broker session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// TWS / IB Gateway host.
    pub host: String,
    /// TWS / IB Gateway API port.
    pub port: u16,
    /// API client id.
    pub client_id: i32,
    /// Trading account; empty adopts the last managed account.
    pub account: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7497, // TWS paper
            client_id: 1,
            account: String::new(),
        }
    }
}

/// Health check settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSettings {
    /// Timer ticks between two health checks.
    pub check_every_ticks: u32,
    /// Period of the timer tick.
    pub tick_period: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_every_ticks: 10,
            tick_period: Duration::from_secs(1),
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Broker session parameters.
    pub connection: ConnectionSettings,
    /// Name stamped on published records.
    pub gateway_name: String,
    /// Zone all published times are expressed in.
    pub reporting_tz: Tz,
    /// Subscription worker poll interval.
    pub subscription_poll_interval: Duration,
    /// Health check settings.
    pub health: HealthSettings,
    /// Path of the JSON contract table.
    pub contract_store: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            gateway_name: DEFAULT_GATEWAY_NAME.to_string(),
            reporting_tz: Tz::UTC,
            subscription_poll_interval: Duration::from_secs(1),
            health: HealthSettings::default(),
            contract_store: PathBuf::from(DEFAULT_CONTRACT_STORE),
        }
    }
}

impl GatewayConfig {
    /// Create configuration from environment variables.
    ///
    /// Unset or unparseable numeric values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `IB_REPORTING_TZ` is not an IANA zone name, or if
    /// `IB_HOST` / `IB_GATEWAY_NAME` is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = parse_env_non_empty("IB_HOST", &defaults.connection.host)?;
        let gateway_name = parse_env_non_empty("IB_GATEWAY_NAME", &defaults.gateway_name)?;

        let reporting_tz = match std::env::var("IB_REPORTING_TZ") {
            Ok(name) => parse_time_zone(&name)?,
            Err(_) => defaults.reporting_tz,
        };

        let connection = ConnectionSettings {
            host,
            port: parse_env("IB_PORT", defaults.connection.port),
            client_id: parse_env("IB_CLIENT_ID", defaults.connection.client_id),
            account: std::env::var("IB_ACCOUNT").unwrap_or_default(),
        };

        let health = HealthSettings {
            check_every_ticks: parse_env(
                "IB_HEALTH_CHECK_TICKS",
                defaults.health.check_every_ticks,
            )
            .max(1),
            tick_period: parse_env_duration_millis(
                "IB_HEALTH_TICK_MS",
                defaults.health.tick_period,
            ),
        };

        Ok(Self {
            connection,
            gateway_name,
            reporting_tz,
            subscription_poll_interval: parse_env_duration_millis(
                "IB_SUBSCRIPTION_POLL_MS",
                defaults.subscription_poll_interval,
            ),
            health,
            contract_store: std::env::var("IB_CONTRACT_STORE")
                .map_or(defaults.contract_store, PathBuf::from),
        })
    }

    /// Options for [`crate::Gateway::new`].
    #[must_use]
    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            gateway_name: self.gateway_name.clone(),
            reporting_tz: self.reporting_tz,
            subscription_poll_interval: self.subscription_poll_interval,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Time-zone name is not in the IANA database.
    #[error("unknown time zone: {0}")]
    InvalidTimeZone(String),
}

/// Parse an IANA zone name such as `America/New_York`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTimeZone`] for unknown names.
pub fn parse_time_zone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimeZone(name.to_string()))
}

fn parse_env_non_empty(key: &str, default: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
        Ok(value) => Ok(value),
        Err(_) => Ok(default.to_string()),
    }
}

/// Parsed value of `key`, or `default` when unset or unparseable.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

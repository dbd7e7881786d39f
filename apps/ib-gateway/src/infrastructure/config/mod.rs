//! Configuration Module
//!
//! Configuration loading for the gateway, from environment variables.

mod settings;

pub use settings::{
    ConfigError, ConnectionSettings, DEFAULT_CONTRACT_STORE, GatewayConfig, HealthSettings,
    parse_time_zone,
};

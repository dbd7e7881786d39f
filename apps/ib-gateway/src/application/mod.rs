//! Application Layer
//!
//! Orchestrates the domain against the broker:
//!
//! - **Ports**: the broker API and the contract store
//! - **Services**: the [`Gateway`] session and its operations
//! - **Events**: records published toward the trading framework

pub mod error;
pub mod events;
pub mod ports;
pub mod services;

pub use error::GatewayError;
pub use events::{EventEmitter, EventReceiver, GatewayEvent, LogData, LogLevel};
pub use services::*;

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! IB Gateway - Broker Connectivity Adapter
//!
//! Bridges a request-style trading interface (subscribe, send order, cancel
//! order, query history) onto the callback-driven Interactive Brokers API.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Records and pure translation logic
//!   - `symbol`: Canonical symbol codec
//!   - `tick`: Tick aggregation and the emit-on-size rule
//!   - `order`, `market`, `instrument`, `clock`: Records and mapping tables
//!
//! - **Application**: The gateway session and its ports
//!   - `ports`: Broker API and contract store interfaces
//!   - `services`: Connection lifecycle, subscription worker, order tracker,
//!     historical query bridge, callback handlers
//!   - `events`: Records published toward the framework
//!
//! - **Infrastructure**: Adapters and ambient concerns
//!   - `config`: Environment configuration
//!   - `store`: JSON and in-memory contract stores
//!   - `health`: Timer-driven health check
//!   - `metrics`, `telemetry`: Prometheus and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//!                 ┌──────────────┐  requests   ┌──────────────┐
//! framework ─────►│   Gateway    │────────────►│ BrokerClient │
//!     ▲           │              │◄────────────│              │
//!     │ events    └──────────────┘  callbacks  └──────────────┘
//!     └──────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Records and pure translation logic, no I/O.
pub mod domain;

/// Application layer - Gateway session and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and host integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{Exchange, OptionType, Product};
pub use domain::market::{
    AccountData, BarData, ContractData, HistoryRequest, Interval, PositionData, SubscribeRequest,
    TickData,
};
pub use domain::order::{
    CancelRequest, Direction, OrderData, OrderRequest, OrderStatus, OrderType, TradeData,
};
pub use domain::symbol::{ContractDescriptor, SecType, SymbolError};

// Gateway
pub use application::ports::{
    BrokerBar, BrokerCallbacks, BrokerClient, BrokerError, BrokerMessage, BrokerOrder,
    BrokerReceiver, ContractDetails, ContractStore, ContractTable, Execution,
    HistoricalDataRequest, PortfolioUpdate, StoreError,
};
pub use application::{
    ConnectionSnapshot, EventReceiver, Gateway, GatewayError, GatewayEvent, GatewayOptions,
    LifecyclePhase, LogData, LogLevel,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, ConnectionSettings, GatewayConfig, HealthSettings, parse_time_zone,
};

// Contract stores
pub use infrastructure::store::{JsonContractStore, MemoryContractStore};

// Health check
pub use infrastructure::health::{HealthMonitor, TickCounter};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};

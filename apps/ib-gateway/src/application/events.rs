//! Outbound events toward the trading framework.
//!
//! Every event carries an immutable snapshot. Log events are mirrored to
//! `tracing` at the matching level.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::market::{AccountData, ContractData, PositionData, TickData};
use crate::domain::order::{OrderData, TradeData};

/// Receiving half handed to the framework.
pub type EventReceiver = mpsc::UnboundedReceiver<GatewayEvent>;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal operation.
    Info,
    /// Rejected request or recoverable fault.
    Warning,
    /// Broker or transport failure.
    Error,
}

/// Log message for the framework's log sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogData {
    /// Gateway that wrote the message.
    pub gateway_name: String,
    /// Message text.
    pub msg: String,
    /// Severity.
    pub level: LogLevel,
    /// Time written, in the reporting zone.
    pub time: DateTime<FixedOffset>,
}

/// Event published by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Quote snapshot.
    Tick(TickData),
    /// Order update.
    Order(OrderData),
    /// Fill.
    Trade(TradeData),
    /// Position update.
    Position(PositionData),
    /// Account update.
    Account(AccountData),
    /// Contract discovered or loaded.
    Contract(ContractData),
    /// Log message.
    Log(LogData),
}

/// Sending side of the event stream.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<GatewayEvent>,
    gateway_name: String,
    tz: Tz,
}

impl EventEmitter {
    /// Create an emitter and the receiver the framework consumes.
    #[must_use]
    pub fn channel(gateway_name: &str, tz: Tz) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                gateway_name: gateway_name.to_string(),
                tz,
            },
            rx,
        )
    }

    /// Gateway name stamped on every record.
    #[must_use]
    pub fn gateway_name(&self) -> &str {
        &self.gateway_name
    }

    /// Reporting time zone.
    #[must_use]
    pub const fn tz(&self) -> Tz {
        self.tz
    }

    /// Current time in the reporting zone.
    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz).fixed_offset()
    }

    /// Publish a quote snapshot.
    pub fn on_tick(&self, tick: TickData) {
        self.send(GatewayEvent::Tick(tick));
    }

    /// Publish an order update.
    pub fn on_order(&self, order: OrderData) {
        self.send(GatewayEvent::Order(order));
    }

    /// Publish a fill.
    pub fn on_trade(&self, trade: TradeData) {
        self.send(GatewayEvent::Trade(trade));
    }

    /// Publish a position.
    pub fn on_position(&self, position: PositionData) {
        self.send(GatewayEvent::Position(position));
    }

    /// Publish an account.
    pub fn on_account(&self, account: AccountData) {
        self.send(GatewayEvent::Account(account));
    }

    /// Publish a contract.
    pub fn on_contract(&self, contract: ContractData) {
        self.send(GatewayEvent::Contract(contract));
    }

    /// Publish a log message and write it to `tracing`.
    pub fn write_log(&self, level: LogLevel, msg: impl Into<String>) {
        let msg = msg.into();
        match level {
            LogLevel::Debug => tracing::debug!(gateway = %self.gateway_name, "{msg}"),
            LogLevel::Info => tracing::info!(gateway = %self.gateway_name, "{msg}"),
            LogLevel::Warning => tracing::warn!(gateway = %self.gateway_name, "{msg}"),
            LogLevel::Error => tracing::error!(gateway = %self.gateway_name, "{msg}"),
        }

        self.send(GatewayEvent::Log(LogData {
            gateway_name: self.gateway_name.clone(),
            msg,
            level,
            time: self.now(),
        }));
    }

    fn send(&self, event: GatewayEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

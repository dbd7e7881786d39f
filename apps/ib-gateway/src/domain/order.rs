//! Order and trade records.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::instrument::Exchange;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Buy.
    Long,
    /// Sell.
    Short,
    /// Net position (portfolio updates only).
    Net,
}

impl Direction {
    /// Order action sent to the broker. `Net` has none.
    #[must_use]
    pub const fn ib_action(self) -> Option<&'static str> {
        match self {
            Self::Long => Some("BUY"),
            Self::Short => Some("SELL"),
            Self::Net => None,
        }
    }

    /// Parse an order action or execution side.
    #[must_use]
    pub fn from_ib(side: &str) -> Option<Self> {
        match side {
            "BUY" | "BOT" => Some(Self::Long),
            "SELL" | "SLD" => Some(Self::Short),
            _ => None,
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Limit order.
    Limit,
    /// Market order.
    Market,
    /// Stop order.
    Stop,
    /// Fill-and-kill.
    Fak,
    /// Fill-or-kill.
    Fok,
}

impl OrderType {
    /// Broker order type code, if the broker supports it.
    #[must_use]
    pub const fn ib_code(self) -> Option<&'static str> {
        match self {
            Self::Limit => Some("LMT"),
            Self::Market => Some("MKT"),
            Self::Stop => Some("STP"),
            Self::Fak | Self::Fok => None,
        }
    }

    /// Parse a broker order type code.
    #[must_use]
    pub fn from_ib(code: &str) -> Option<Self> {
        match code {
            "LMT" => Some(Self::Limit),
            "MKT" => Some(Self::Market),
            "STP" => Some(Self::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
            Self::Stop => write!(f, "STOP"),
            Self::Fak => write!(f, "FAK"),
            Self::Fok => write!(f, "FOK"),
        }
    }
}

/// Canonical order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Sent, not yet acknowledged.
    Submitting,
    /// Working at the broker, nothing filled.
    NotTraded,
    /// Completely filled.
    AllTraded,
    /// Cancelled.
    Cancelled,
    /// Rejected or made inactive by the broker.
    Rejected,
}

impl OrderStatus {
    /// Map a broker status string.
    ///
    /// Unrecognized strings return `None`; callers keep the previous status.
    #[must_use]
    pub fn from_ib(status: &str) -> Option<Self> {
        match status {
            "ApiPending" | "PendingSubmit" => Some(Self::Submitting),
            "PreSubmitted" | "Submitted" => Some(Self::NotTraded),
            "ApiCancelled" | "Cancelled" => Some(Self::Cancelled),
            "Filled" => Some(Self::AllTraded),
            "Inactive" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true if the order can still trade or be cancelled.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::NotTraded)
    }
}

/// Snapshot of a tracked order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderData {
    /// Gateway that owns the order.
    pub gateway_name: String,
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
    /// Broker order id, as a string.
    pub orderid: String,
    /// Order type.
    pub order_type: OrderType,
    /// Direction.
    pub direction: Direction,
    /// Limit or stop price; zero for market orders.
    pub price: Decimal,
    /// Total quantity.
    pub volume: Decimal,
    /// Filled quantity.
    pub traded: Decimal,
    /// Current status.
    pub status: OrderStatus,
    /// Creation time, when known locally.
    pub datetime: Option<DateTime<FixedOffset>>,
}

impl OrderData {
    /// Framework-wide order reference, `{gateway}.{orderid}`.
    #[must_use]
    pub fn vt_orderid(&self) -> String {
        format!("{}.{}", self.gateway_name, self.orderid)
    }

    /// `{symbol}.{exchange}`.
    #[must_use]
    pub fn vt_symbol(&self) -> String {
        vt_symbol(&self.symbol, self.exchange)
    }
}

/// Immutable fill report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeData {
    /// Gateway that received the fill.
    pub gateway_name: String,
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
    /// Broker order id.
    pub orderid: String,
    /// Broker execution id.
    pub tradeid: String,
    /// Direction.
    pub direction: Direction,
    /// Fill price.
    pub price: Decimal,
    /// Fill quantity.
    pub volume: Decimal,
    /// Fill time in the reporting zone.
    pub datetime: DateTime<FixedOffset>,
}

/// Order submission request from the framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
    /// Direction.
    pub direction: Direction,
    /// Order type.
    pub order_type: OrderType,
    /// Quantity.
    pub volume: Decimal,
    /// Limit or stop price.
    pub price: Decimal,
}

impl OrderRequest {
    /// Local record for a freshly submitted order.
    #[must_use]
    pub fn create_order_data(&self, orderid: String, gateway_name: &str) -> OrderData {
        OrderData {
            gateway_name: gateway_name.to_string(),
            symbol: self.symbol.clone(),
            exchange: self.exchange,
            orderid,
            order_type: self.order_type,
            direction: self.direction,
            price: self.price,
            volume: self.volume,
            traded: Decimal::ZERO,
            status: OrderStatus::Submitting,
            datetime: None,
        }
    }
}

/// Cancellation request from the framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Broker order id.
    pub orderid: String,
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
}

/// `{symbol}.{exchange}`, the framework's instrument key.
#[must_use]
pub fn vt_symbol(symbol: &str, exchange: Exchange) -> String {
    format!("{symbol}.{exchange}")
}

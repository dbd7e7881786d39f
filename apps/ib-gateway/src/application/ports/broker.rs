//! Broker Port (Driven Port)
//!
//! The wrapped broker API, split into its two directions:
//!
//! - [`BrokerClient`]: requests the adapter sends.
//! - [`BrokerCallbacks`]: one handler per callback kind. Transport
//!   implementations deliver callbacks as [`BrokerMessage`] values on the
//!   channel returned by [`BrokerClient::connect`]; the receive loop routes
//!   each through [`BrokerMessage::dispatch`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::symbol::ContractDescriptor;

/// Inbound callback stream for one session.
pub type BrokerReceiver = mpsc::UnboundedReceiver<BrokerMessage>;

/// Errors raised by a broker transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The socket could not be opened.
    #[error("connection error: {message}")]
    ConnectionError {
        /// Transport error message.
        message: String,
    },

    /// A request was issued without an open socket.
    #[error("not connected")]
    NotConnected,

    /// The request could not be written.
    #[error("request failed: {message}")]
    RequestFailed {
        /// Transport error message.
        message: String,
    },
}

/// Order as the broker represents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerOrder {
    /// Broker order id.
    pub order_id: i32,
    /// Client id of the placing session.
    pub client_id: i32,
    /// `BUY` or `SELL`.
    pub action: String,
    /// `LMT`, `MKT`, `STP`, ...
    pub order_type: String,
    /// Quantity.
    pub total_quantity: Decimal,
    /// Limit price.
    pub lmt_price: Option<Decimal>,
    /// Stop trigger price.
    pub aux_price: Option<Decimal>,
    /// Account code.
    pub account: String,
    /// Allow fills outside regular trading hours.
    pub outside_rth: bool,
}

/// Fill report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Broker execution id.
    pub exec_id: String,
    /// Order the fill belongs to.
    pub order_id: i32,
    /// `BOT` or `SLD`.
    pub side: String,
    /// Fill quantity.
    pub shares: Decimal,
    /// Fill price.
    pub price: Decimal,
    /// `YYYYMMDD HH:MM:SS[ Zone]`.
    pub time: String,
}

/// Contract details reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDetails {
    /// Resolved contract.
    pub contract: ContractDescriptor,
    /// Long name.
    pub long_name: String,
    /// Minimum price increment.
    pub min_tick: Decimal,
    /// Trading hours string.
    pub trading_hours: String,
    /// Time-zone id the trading hours are expressed in.
    pub time_zone_id: String,
    /// Exchange-local symbol.
    pub local_symbol: String,
}

/// Portfolio line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioUpdate {
    /// Contract held.
    pub contract: ContractDescriptor,
    /// Signed position.
    pub position: Decimal,
    /// Current market price.
    pub market_price: Decimal,
    /// Current market value.
    pub market_value: Decimal,
    /// Average cost including the multiplier.
    pub average_cost: Decimal,
    /// Unrealized profit and loss.
    pub unrealized_pnl: Decimal,
    /// Realized profit and loss.
    pub realized_pnl: Decimal,
    /// Account code.
    pub account_name: String,
}

/// Historical bar as sent by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerBar {
    /// `YYYYMMDD`, `YYYYMMDD HH:MM:SS[ Zone]`, or epoch seconds.
    pub date: String,
    /// Open.
    pub open: Decimal,
    /// High.
    pub high: Decimal,
    /// Low.
    pub low: Decimal,
    /// Close.
    pub close: Decimal,
    /// Volume; negative means no data.
    pub volume: Decimal,
}

/// Parameters of a historical data request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDataRequest {
    /// `YYYYMMDD HH:MM:SS`, or empty for now.
    pub end_date_time: String,
    /// `"{days} D"`.
    pub duration: String,
    /// `1 min`, `1 hour`, `1 day`, `1 week`.
    pub bar_size: String,
    /// `TRADES` or `MIDPOINT`.
    pub what_to_show: String,
    /// Restrict to regular trading hours.
    pub use_rth: bool,
    /// Date format selector (1 = string).
    pub format_date: i32,
}

/// Requests toward the broker.
///
/// Only `connect` awaits: it opens the socket and hands back the callback
/// stream. Every other request is a write on the already-open session.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Open the session and return its callback stream.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
    ) -> Result<BrokerReceiver, BrokerError>;

    /// Close the socket.
    fn disconnect(&self);

    /// Whether the socket is open.
    fn is_connected(&self) -> bool;

    /// Ask for the server clock.
    fn req_current_time(&self) -> Result<(), BrokerError>;

    /// Ask for the next valid order id.
    fn req_ids(&self, num_ids: i32) -> Result<(), BrokerError>;

    /// Resolve contract metadata.
    fn req_contract_details(
        &self,
        req_id: i32,
        contract: &ContractDescriptor,
    ) -> Result<(), BrokerError>;

    /// Start streaming level-one quotes.
    fn req_mkt_data(&self, req_id: i32, contract: &ContractDescriptor)
    -> Result<(), BrokerError>;

    /// Submit an order.
    fn place_order(
        &self,
        order_id: i32,
        contract: &ContractDescriptor,
        order: &BrokerOrder,
    ) -> Result<(), BrokerError>;

    /// Cancel an order. `manual_cancel_time` is `YYYYMMDD-HH:MM:SS`.
    fn cancel_order(&self, order_id: i32, manual_cancel_time: &str) -> Result<(), BrokerError>;

    /// Request historical bars.
    fn req_historical_data(
        &self,
        req_id: i32,
        contract: &ContractDescriptor,
        request: &HistoricalDataRequest,
    ) -> Result<(), BrokerError>;

    /// Start or stop account and portfolio updates.
    fn req_account_updates(&self, subscribe: bool, account: &str) -> Result<(), BrokerError>;
}

/// Callback handlers, one per callback kind.
pub trait BrokerCallbacks {
    /// Socket handshake acknowledged.
    fn connect_ack(&self);
    /// Socket closed.
    fn connection_closed(&self);
    /// Next valid order id; the first one after `connect_ack` completes the handshake.
    fn next_valid_id(&self, order_id: i32);
    /// Server clock, epoch seconds.
    fn current_time(&self, time: i64);
    /// Error or notice. `req_id` is -1 when not tied to a request.
    fn error(&self, req_id: i32, code: i32, message: &str);
    /// Price field update.
    fn tick_price(&self, req_id: i32, field: i32, price: Decimal);
    /// Size field update.
    fn tick_size(&self, req_id: i32, field: i32, size: Decimal);
    /// Order status change.
    fn order_status(&self, order_id: i32, status: &str, filled: Decimal, remaining: Decimal);
    /// Full order parameters, possibly for an order another session placed.
    fn open_order(&self, order_id: i32, contract: &ContractDescriptor, order: &BrokerOrder);
    /// Fill report.
    fn exec_details(&self, req_id: i32, contract: &ContractDescriptor, execution: &Execution);
    /// Account key/value.
    fn update_account_value(&self, key: &str, value: &str, currency: &str, account_name: &str);
    /// Portfolio line.
    fn update_portfolio(&self, update: &PortfolioUpdate);
    /// End of one account update batch.
    fn update_account_time(&self, time_stamp: &str);
    /// Comma-separated account codes.
    fn managed_accounts(&self, accounts_list: &str);
    /// Contract details reply.
    fn contract_details(&self, req_id: i32, details: &ContractDetails);
    /// One historical bar.
    fn historical_data(&self, req_id: i32, bar: &BrokerBar);
    /// Historical request complete.
    fn historical_data_end(&self, req_id: i32, start: &str, end: &str);
}

/// One inbound callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerMessage {
    /// See [`BrokerCallbacks::connect_ack`].
    ConnectAck,
    /// See [`BrokerCallbacks::connection_closed`].
    ConnectionClosed,
    /// See [`BrokerCallbacks::next_valid_id`].
    NextValidId(i32),
    /// See [`BrokerCallbacks::current_time`].
    CurrentTime(i64),
    /// See [`BrokerCallbacks::error`].
    Error {
        /// Request id, or -1.
        req_id: i32,
        /// Error code.
        code: i32,
        /// Error text.
        message: String,
    },
    /// See [`BrokerCallbacks::tick_price`].
    TickPrice {
        /// Market data request id.
        req_id: i32,
        /// Tick type code.
        field: i32,
        /// Price.
        price: Decimal,
    },
    /// See [`BrokerCallbacks::tick_size`].
    TickSize {
        /// Market data request id.
        req_id: i32,
        /// Tick type code.
        field: i32,
        /// Size.
        size: Decimal,
    },
    /// See [`BrokerCallbacks::order_status`].
    OrderStatus {
        /// Broker order id.
        order_id: i32,
        /// Broker status string.
        status: String,
        /// Filled quantity.
        filled: Decimal,
        /// Remaining quantity.
        remaining: Decimal,
    },
    /// See [`BrokerCallbacks::open_order`].
    OpenOrder {
        /// Broker order id.
        order_id: i32,
        /// Contract.
        contract: ContractDescriptor,
        /// Order parameters.
        order: BrokerOrder,
    },
    /// See [`BrokerCallbacks::exec_details`].
    ExecDetails {
        /// Request id, -1 for unsolicited fills.
        req_id: i32,
        /// Contract.
        contract: ContractDescriptor,
        /// Fill.
        execution: Execution,
    },
    /// See [`BrokerCallbacks::update_account_value`].
    UpdateAccountValue {
        /// Account key.
        key: String,
        /// Value as text.
        value: String,
        /// Currency, empty for unitless keys.
        currency: String,
        /// Account code.
        account_name: String,
    },
    /// See [`BrokerCallbacks::update_portfolio`].
    UpdatePortfolio(PortfolioUpdate),
    /// See [`BrokerCallbacks::update_account_time`].
    UpdateAccountTime(String),
    /// See [`BrokerCallbacks::managed_accounts`].
    ManagedAccounts(String),
    /// See [`BrokerCallbacks::contract_details`].
    ContractDetails {
        /// Request id.
        req_id: i32,
        /// Details.
        details: ContractDetails,
    },
    /// See [`BrokerCallbacks::historical_data`].
    HistoricalData {
        /// Request id.
        req_id: i32,
        /// Bar.
        bar: BrokerBar,
    },
    /// See [`BrokerCallbacks::historical_data_end`].
    HistoricalDataEnd {
        /// Request id.
        req_id: i32,
        /// Range start.
        start: String,
        /// Range end.
        end: String,
    },
}

impl BrokerMessage {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectAck => "connect_ack",
            Self::ConnectionClosed => "connection_closed",
            Self::NextValidId(_) => "next_valid_id",
            Self::CurrentTime(_) => "current_time",
            Self::Error { .. } => "error",
            Self::TickPrice { .. } => "tick_price",
            Self::TickSize { .. } => "tick_size",
            Self::OrderStatus { .. } => "order_status",
            Self::OpenOrder { .. } => "open_order",
            Self::ExecDetails { .. } => "exec_details",
            Self::UpdateAccountValue { .. } => "update_account_value",
            Self::UpdatePortfolio(_) => "update_portfolio",
            Self::UpdateAccountTime(_) => "update_account_time",
            Self::ManagedAccounts(_) => "managed_accounts",
            Self::ContractDetails { .. } => "contract_details",
            Self::HistoricalData { .. } => "historical_data",
            Self::HistoricalDataEnd { .. } => "historical_data_end",
        }
    }

    /// Route this message to its handler.
    pub fn dispatch(&self, handler: &(impl BrokerCallbacks + ?Sized)) {
        match self {
            Self::ConnectAck => handler.connect_ack(),
            Self::ConnectionClosed => handler.connection_closed(),
            Self::NextValidId(order_id) => handler.next_valid_id(*order_id),
            Self::CurrentTime(time) => handler.current_time(*time),
            Self::Error {
                req_id,
                code,
                message,
            } => handler.error(*req_id, *code, message),
            Self::TickPrice {
                req_id,
                field,
                price,
            } => handler.tick_price(*req_id, *field, *price),
            Self::TickSize {
                req_id,
                field,
                size,
            } => handler.tick_size(*req_id, *field, *size),
            Self::OrderStatus {
                order_id,
                status,
                filled,
                remaining,
            } => handler.order_status(*order_id, status, *filled, *remaining),
            Self::OpenOrder {
                order_id,
                contract,
                order,
            } => handler.open_order(*order_id, contract, order),
            Self::ExecDetails {
                req_id,
                contract,
                execution,
            } => handler.exec_details(*req_id, contract, execution),
            Self::UpdateAccountValue {
                key,
                value,
                currency,
                account_name,
            } => handler.update_account_value(key, value, currency, account_name),
            Self::UpdatePortfolio(update) => handler.update_portfolio(update),
            Self::UpdateAccountTime(time_stamp) => handler.update_account_time(time_stamp),
            Self::ManagedAccounts(accounts) => handler.managed_accounts(accounts),
            Self::ContractDetails { req_id, details } => {
                handler.contract_details(*req_id, details);
            }
            Self::HistoricalData { req_id, bar } => handler.historical_data(*req_id, bar),
            Self::HistoricalDataEnd { req_id, start, end } => {
                handler.historical_data_end(*req_id, start, end);
            }
        }
    }
}

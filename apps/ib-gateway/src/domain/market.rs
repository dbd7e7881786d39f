//! Market data, reference data, and account records.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instrument::{Exchange, OptionType, Product};
use super::order::vt_symbol;

/// Level-one quote snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickData {
    /// Gateway that produced the tick.
    pub gateway_name: String,
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
    /// Time of the last quote update.
    pub datetime: DateTime<FixedOffset>,
    /// Contract display name.
    pub name: String,
    /// Session volume.
    pub volume: Decimal,
    /// Last trade price.
    pub last_price: Decimal,
    /// Last trade size.
    pub last_volume: Decimal,
    /// Session high.
    pub high_price: Decimal,
    /// Session low.
    pub low_price: Decimal,
    /// Session open.
    pub open_price: Decimal,
    /// Previous close.
    pub pre_close: Decimal,
    /// Best bid.
    pub bid_price_1: Decimal,
    /// Best ask.
    pub ask_price_1: Decimal,
    /// Best bid size.
    pub bid_volume_1: Decimal,
    /// Best ask size.
    pub ask_volume_1: Decimal,
}

impl TickData {
    /// Empty snapshot for a newly subscribed instrument.
    #[must_use]
    pub fn new(
        gateway_name: &str,
        symbol: &str,
        exchange: Exchange,
        datetime: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            gateway_name: gateway_name.to_string(),
            symbol: symbol.to_string(),
            exchange,
            datetime,
            name: String::new(),
            volume: Decimal::ZERO,
            last_price: Decimal::ZERO,
            last_volume: Decimal::ZERO,
            high_price: Decimal::ZERO,
            low_price: Decimal::ZERO,
            open_price: Decimal::ZERO,
            pre_close: Decimal::ZERO,
            bid_price_1: Decimal::ZERO,
            ask_price_1: Decimal::ZERO,
            bid_volume_1: Decimal::ZERO,
            ask_volume_1: Decimal::ZERO,
        }
    }

    /// `{symbol}.{exchange}`.
    #[must_use]
    pub fn vt_symbol(&self) -> String {
        vt_symbol(&self.symbol, self.exchange)
    }
}

/// Bar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interval {
    /// One minute.
    Minute,
    /// One hour.
    Hour,
    /// One day.
    Daily,
    /// One week.
    Weekly,
    /// Tick-by-tick; not available as historical bars.
    Tick,
}

impl Interval {
    /// Broker bar size setting.
    #[must_use]
    pub const fn ib_bar_size(self) -> Option<&'static str> {
        match self {
            Self::Minute => Some("1 min"),
            Self::Hour => Some("1 hour"),
            Self::Daily => Some("1 day"),
            Self::Weekly => Some("1 week"),
            Self::Tick => None,
        }
    }
}

/// OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarData {
    /// Gateway that produced the bar.
    pub gateway_name: String,
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
    /// Bar open time in the reporting zone.
    pub datetime: DateTime<FixedOffset>,
    /// Bar interval.
    pub interval: Interval,
    /// Volume, never negative.
    pub volume: Decimal,
    /// Open.
    pub open_price: Decimal,
    /// High.
    pub high_price: Decimal,
    /// Low.
    pub low_price: Decimal,
    /// Close.
    pub close_price: Decimal,
}

/// Market data subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
}

impl SubscribeRequest {
    /// Create a subscription request.
    #[must_use]
    pub fn new(symbol: impl Into<String>, exchange: Exchange) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
        }
    }

    /// Dedup key, `{symbol}.{exchange}`.
    #[must_use]
    pub fn vt_symbol(&self) -> String {
        vt_symbol(&self.symbol, self.exchange)
    }
}

/// Historical bar query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
    /// Earliest bar wanted.
    pub start: DateTime<FixedOffset>,
    /// Latest bar wanted; `None` means now.
    pub end: Option<DateTime<FixedOffset>>,
    /// Bar interval.
    pub interval: Interval,
}

/// Contract reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractData {
    /// Gateway that discovered the contract.
    pub gateway_name: String,
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
    /// Long name.
    pub name: String,
    /// Product class.
    pub product: Product,
    /// Contract multiplier.
    pub size: Decimal,
    /// Minimum price increment.
    pub pricetick: Decimal,
    /// Broker trading-hours string.
    pub trading_hours: String,
    /// Broker time-zone id for the trading hours.
    pub time_zone: String,
    /// Exchange-local symbol.
    pub local_symbol: String,
    /// Option strike.
    pub option_strike: Option<Decimal>,
    /// Option right.
    pub option_type: Option<OptionType>,
    /// Option expiry as reported by the broker.
    pub option_expiry: Option<String>,
}

impl ContractData {
    /// `{symbol}.{exchange}`.
    #[must_use]
    pub fn vt_symbol(&self) -> String {
        vt_symbol(&self.symbol, self.exchange)
    }
}

/// Per-currency account balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    /// Gateway that reported the account.
    pub gateway_name: String,
    /// `{account}.{currency}`.
    pub accountid: String,
    /// Net liquidation value.
    pub balance: Decimal,
    /// Available funds.
    pub available: Decimal,
    /// Maintenance margin.
    pub margin: Decimal,
    /// Unrealized profit and loss.
    pub position_profit: Decimal,
}

impl AccountData {
    /// Zeroed account record.
    #[must_use]
    pub fn new(gateway_name: &str, accountid: String) -> Self {
        Self {
            gateway_name: gateway_name.to_string(),
            accountid,
            balance: Decimal::ZERO,
            available: Decimal::ZERO,
            margin: Decimal::ZERO,
            position_profit: Decimal::ZERO,
        }
    }
}

/// Net position in one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionData {
    /// Gateway that reported the position.
    pub gateway_name: String,
    /// Canonical symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: Exchange,
    /// Always `Direction::Net` for this broker.
    pub direction: super::order::Direction,
    /// Signed quantity.
    pub volume: Decimal,
    /// Average cost per unit.
    pub price: Decimal,
    /// Unrealized profit and loss.
    pub pnl: Decimal,
}

//! Tick Aggregator
//!
//! Folds the broker's partial price and size updates into one mutable
//! [`TickData`] per streaming request.
//!
//! The broker always follows a price update with the matching size update,
//! so snapshots are only published after size updates. Publishing on a price
//! update alone would expose a size that belongs to the previous price.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use super::instrument::Exchange;
use super::market::TickData;

/// Decimal places kept when synthesizing a midpoint last price.
pub const MIDPOINT_DECIMALS: u32 = 5;

/// Tick fields the aggregator tracks, keyed by broker tick type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickField {
    /// 0
    BidVolume,
    /// 1
    BidPrice,
    /// 2
    AskPrice,
    /// 3
    AskVolume,
    /// 4
    LastPrice,
    /// 5
    LastVolume,
    /// 6
    High,
    /// 7
    Low,
    /// 8
    Volume,
    /// 9
    PreClose,
    /// 14
    Open,
}

impl TickField {
    /// Map a broker tick type code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::BidVolume),
            1 => Some(Self::BidPrice),
            2 => Some(Self::AskPrice),
            3 => Some(Self::AskVolume),
            4 => Some(Self::LastPrice),
            5 => Some(Self::LastVolume),
            6 => Some(Self::High),
            7 => Some(Self::Low),
            8 => Some(Self::Volume),
            9 => Some(Self::PreClose),
            14 => Some(Self::Open),
            _ => None,
        }
    }

    fn write(self, tick: &mut TickData, value: Decimal) {
        let slot = match self {
            Self::BidVolume => &mut tick.bid_volume_1,
            Self::BidPrice => &mut tick.bid_price_1,
            Self::AskPrice => &mut tick.ask_price_1,
            Self::AskVolume => &mut tick.ask_volume_1,
            Self::LastPrice => &mut tick.last_price,
            Self::LastVolume => &mut tick.last_volume,
            Self::High => &mut tick.high_price,
            Self::Low => &mut tick.low_price,
            Self::Volume => &mut tick.volume,
            Self::PreClose => &mut tick.pre_close,
            Self::Open => &mut tick.open_price,
        };
        *slot = value;
    }
}

/// The broker sends no last price for forex and spot commodities.
fn synthesizes_last_price(tick: &TickData) -> bool {
    tick.exchange == Exchange::Idealpro || tick.symbol.ends_with("-CMDTY")
}

/// Live tick records keyed by market data request id.
#[derive(Debug, Default)]
pub struct TickBook {
    ticks: HashMap<i32, TickData>,
}

impl TickBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a tick for a streaming request.
    pub fn insert(&mut self, req_id: i32, tick: TickData) {
        self.ticks.insert(req_id, tick);
    }

    /// Stop tracking one request.
    pub fn remove(&mut self, req_id: i32) -> Option<TickData> {
        self.ticks.remove(&req_id)
    }

    /// Drop every record; their request ids died with the session.
    pub fn clear(&mut self) {
        self.ticks.clear();
    }

    /// Number of tracked records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Current record for a request id.
    #[must_use]
    pub fn get(&self, req_id: i32) -> Option<&TickData> {
        self.ticks.get(&req_id)
    }

    /// Apply a price update. Never produces a snapshot.
    ///
    /// `name_of` looks up a display name by `vt_symbol`. Returns false when
    /// the request id or field code is unknown.
    pub fn apply_price(
        &mut self,
        req_id: i32,
        code: i32,
        price: Decimal,
        now: DateTime<FixedOffset>,
        name_of: impl FnOnce(&str) -> Option<String>,
    ) -> bool {
        let Some(tick) = self.ticks.get_mut(&req_id) else {
            return false;
        };
        let Some(field) = TickField::from_code(code) else {
            return false;
        };

        field.write(tick, price);

        if let Some(name) = name_of(&tick.vt_symbol()) {
            tick.name = name;
        }

        if synthesizes_last_price(tick)
            && !tick.bid_price_1.is_zero()
            && !tick.ask_price_1.is_zero()
        {
            tick.last_price =
                ((tick.bid_price_1 + tick.ask_price_1) / Decimal::TWO).round_dp(MIDPOINT_DECIMALS);
        }

        tick.datetime = now;
        true
    }

    /// Apply a size update and return the snapshot to publish.
    pub fn apply_size(
        &mut self,
        req_id: i32,
        code: i32,
        size: Decimal,
        now: DateTime<FixedOffset>,
    ) -> Option<TickData> {
        let tick = self.ticks.get_mut(&req_id)?;
        let field = TickField::from_code(code)?;

        field.write(tick, size);
        tick.datetime = now;

        Some(tick.clone())
    }
}

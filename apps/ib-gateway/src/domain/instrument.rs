//! Instrument reference tables.
//!
//! Exchange, product, and option-type enums, plus the translation between
//! framework exchange names and the routing codes the broker expects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange as named by the trading framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Exchange {
    /// Broker smart routing.
    Smart,
    /// New York Mercantile Exchange.
    Nymex,
    /// Commodity Exchange.
    Comex,
    /// CME Globex.
    Globex,
    /// Interactive Brokers forex venue.
    Idealpro,
    /// Chicago Mercantile Exchange.
    Cme,
    /// Chicago Board of Trade.
    Cbot,
    /// Chicago Board Options Exchange.
    Cboe,
    /// Intercontinental Exchange.
    Ice,
    /// Stock Exchange of Hong Kong.
    Sehk,
    /// Shanghai Stock Exchange (northbound connect).
    Sse,
    /// Shenzhen Stock Exchange (northbound connect).
    Szse,
    /// Hong Kong Futures Exchange.
    Hkfe,
    /// CBOE Futures Exchange.
    Cfe,
    /// Toronto Stock Exchange.
    Tse,
    /// New York Stock Exchange.
    Nyse,
    /// Nasdaq.
    Nasdaq,
    /// NYSE American.
    Amex,
    /// NYSE Arca.
    Arca,
    /// Cboe EDGA.
    Edgea,
    /// Nasdaq ISLAND book.
    Island,
    /// Cboe BZX.
    Bats,
    /// Investors Exchange.
    Iex,
    /// IBKR alternative trading system.
    Ibkrats,
    /// OTC markets (pink sheets).
    Otc,
    /// Singapore Exchange.
    Sgx,
    /// China Financial Futures Exchange. Not routable through this broker.
    Cffex,
    /// Shanghai Futures Exchange. Not routable through this broker.
    Shfe,
    /// Framework-local pseudo exchange. Not routable through this broker.
    Local,
}

impl Exchange {
    /// Every exchange the framework knows about.
    pub const ALL: [Self; 29] = [
        Self::Smart,
        Self::Nymex,
        Self::Comex,
        Self::Globex,
        Self::Idealpro,
        Self::Cme,
        Self::Cbot,
        Self::Cboe,
        Self::Ice,
        Self::Sehk,
        Self::Sse,
        Self::Szse,
        Self::Hkfe,
        Self::Cfe,
        Self::Tse,
        Self::Nyse,
        Self::Nasdaq,
        Self::Amex,
        Self::Arca,
        Self::Edgea,
        Self::Island,
        Self::Bats,
        Self::Iex,
        Self::Ibkrats,
        Self::Otc,
        Self::Sgx,
        Self::Cffex,
        Self::Shfe,
        Self::Local,
    ];

    /// Framework name of the exchange.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smart => "SMART",
            Self::Nymex => "NYMEX",
            Self::Comex => "COMEX",
            Self::Globex => "GLOBEX",
            Self::Idealpro => "IDEALPRO",
            Self::Cme => "CME",
            Self::Cbot => "CBOT",
            Self::Cboe => "CBOE",
            Self::Ice => "ICE",
            Self::Sehk => "SEHK",
            Self::Sse => "SSE",
            Self::Szse => "SZSE",
            Self::Hkfe => "HKFE",
            Self::Cfe => "CFE",
            Self::Tse => "TSE",
            Self::Nyse => "NYSE",
            Self::Nasdaq => "NASDAQ",
            Self::Amex => "AMEX",
            Self::Arca => "ARCA",
            Self::Edgea => "EDGEA",
            Self::Island => "ISLAND",
            Self::Bats => "BATS",
            Self::Iex => "IEX",
            Self::Ibkrats => "IBKRATS",
            Self::Otc => "OTC",
            Self::Sgx => "SGX",
            Self::Cffex => "CFFEX",
            Self::Shfe => "SHFE",
            Self::Local => "LOCAL",
        }
    }

    /// Routing code the broker uses for this exchange, if it routes there.
    #[must_use]
    pub const fn ib_code(self) -> Option<&'static str> {
        match self {
            Self::Sse => Some("SEHKNTL"),
            Self::Szse => Some("SEHKSZSE"),
            Self::Otc => Some("PINK"),
            Self::Cffex | Self::Shfe | Self::Local => None,
            other => Some(other.as_str()),
        }
    }

    /// Map a broker routing code back to the framework exchange.
    #[must_use]
    pub fn from_ib(code: &str) -> Option<Self> {
        match code {
            "SEHKNTL" => Some(Self::Sse),
            "SEHKSZSE" => Some(Self::Szse),
            "PINK" => Some(Self::Otc),
            "SSE" | "SZSE" | "OTC" => None,
            other => Self::parse(other).filter(|exchange| exchange.ib_code().is_some()),
        }
    }

    /// Parse a framework exchange name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|exchange| exchange.as_str() == name)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product class of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Product {
    /// Stocks and ETFs.
    Equity,
    /// Currency pairs.
    Forex,
    /// Spot commodities.
    Spot,
    /// Futures, including continuous futures.
    Futures,
    /// Options and futures options.
    Option,
    /// Indices.
    Index,
}

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionType {
    /// Call option (`C`).
    Call,
    /// Put option (`P`).
    Put,
}

impl OptionType {
    /// Single-letter broker code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }

    /// Parse a broker right code.
    #[must_use]
    pub fn from_ib(code: &str) -> Option<Self> {
        match code {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_exchanges_use_broker_codes() {
        assert_eq!(Exchange::Sse.ib_code(), Some("SEHKNTL"));
        assert_eq!(Exchange::Szse.ib_code(), Some("SEHKSZSE"));
        assert_eq!(Exchange::Otc.ib_code(), Some("PINK"));
        assert_eq!(Exchange::Globex.ib_code(), Some("GLOBEX"));
    }

    #[test]
    fn unroutable_exchanges_have_no_code() {
        for exchange in [Exchange::Cffex, Exchange::Shfe, Exchange::Local] {
            assert!(exchange.ib_code().is_none(), "{exchange} should be unroutable");
        }
    }

    #[test]
    fn broker_codes_map_back() {
        for exchange in Exchange::ALL {
            if let Some(code) = exchange.ib_code() {
                assert_eq!(Exchange::from_ib(code), Some(exchange));
            }
        }
        assert_eq!(Exchange::from_ib("SSE"), None);
        assert_eq!(Exchange::from_ib("CFFEX"), None);
        assert_eq!(Exchange::from_ib("NOPE"), None);
    }

    #[test]
    fn parse_uses_framework_names() {
        assert_eq!(Exchange::parse("IDEALPRO"), Some(Exchange::Idealpro));
        assert_eq!(Exchange::parse("idealpro"), None);
    }

    #[test]
    fn option_type_codes() {
        assert_eq!(OptionType::from_ib("C"), Some(OptionType::Call));
        assert_eq!(OptionType::from_ib("PUT"), Some(OptionType::Put));
        assert_eq!(OptionType::from_ib("X"), None);
        assert_eq!(OptionType::Put.as_str(), "P");
    }
}

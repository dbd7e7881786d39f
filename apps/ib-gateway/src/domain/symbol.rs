//! Symbol Codec
//!
//! Translates between the framework's dash-joined canonical symbol and the
//! broker's contract descriptor. The two directions must be exact inverses:
//! subscriptions are matched against symbols re-encoded from broker
//! callbacks, so any drift silently stops data from matching.
//!
//! # Layout
//!
//! The last two fields are always `{currency}-{sec_type}`.
//!
//! | sec type                         | leading fields                        |
//! |----------------------------------|---------------------------------------|
//! | `STK` `CASH` `CMDTY` `IND` `CONTFUT` | `root`                            |
//! | `FUT`                            | `root-expiry`                         |
//! | `OPT` `FOP`                      | `root-expiry-right-strike-multiplier` |
//!
//! `decode` also accepts `root-expiry-multiplier-{currency}-FUT`, which
//! `encode` never produces.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::instrument::{Exchange, OptionType, Product};

/// Separator between canonical symbol fields.
pub const JOIN_SYMBOL: &str = "-";

/// Broker security type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecType {
    /// Stock.
    #[serde(rename = "STK")]
    Stk,
    /// Forex pair.
    #[serde(rename = "CASH")]
    Cash,
    /// Spot commodity.
    #[serde(rename = "CMDTY")]
    Cmdty,
    /// Dated future.
    #[serde(rename = "FUT")]
    Fut,
    /// Continuous future.
    #[serde(rename = "CONTFUT")]
    ContFut,
    /// Option.
    #[serde(rename = "OPT")]
    Opt,
    /// Future option.
    #[serde(rename = "FOP")]
    Fop,
    /// Index.
    #[serde(rename = "IND")]
    Ind,
}

impl SecType {
    /// Broker token for the security type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stk => "STK",
            Self::Cash => "CASH",
            Self::Cmdty => "CMDTY",
            Self::Fut => "FUT",
            Self::ContFut => "CONTFUT",
            Self::Opt => "OPT",
            Self::Fop => "FOP",
            Self::Ind => "IND",
        }
    }

    /// Parse a broker security type token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "STK" => Some(Self::Stk),
            "CASH" => Some(Self::Cash),
            "CMDTY" => Some(Self::Cmdty),
            "FUT" => Some(Self::Fut),
            "CONTFUT" => Some(Self::ContFut),
            "OPT" => Some(Self::Opt),
            "FOP" => Some(Self::Fop),
            "IND" => Some(Self::Ind),
            _ => None,
        }
    }

    /// Product class reported to the framework.
    #[must_use]
    pub const fn product(self) -> Product {
        match self {
            Self::Stk => Product::Equity,
            Self::Cash => Product::Forex,
            Self::Cmdty => Product::Spot,
            Self::Fut | Self::ContFut => Product::Futures,
            Self::Opt | Self::Fop => Product::Option,
            Self::Ind => Product::Index,
        }
    }

    /// True for option-like contracts.
    #[must_use]
    pub const fn is_option(self) -> bool {
        matches!(self, Self::Opt | Self::Fop)
    }

    /// Historical bars for these are quoted on the midpoint.
    #[must_use]
    pub const fn uses_midpoint_history(self) -> bool {
        matches!(self, Self::Cash | Self::Cmdty)
    }
}

impl fmt::Display for SecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker-side contract descriptor.
///
/// Field names follow the broker's contract object. Fields a security type
/// does not use are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    /// Underlying root, e.g. `AAPL` or `ES`.
    pub symbol: String,
    /// Security type.
    pub sec_type: SecType,
    /// Quote currency.
    pub currency: String,
    /// Broker routing code.
    pub exchange: String,
    /// Primary listing exchange, reported by the broker on some callbacks.
    pub primary_exchange: Option<String>,
    /// Expiry or contract month.
    pub last_trade_date: Option<String>,
    /// Option right.
    pub right: Option<OptionType>,
    /// Option strike, kept at the scale it was written with.
    pub strike: Option<Decimal>,
    /// Contract multiplier.
    pub multiplier: Option<Decimal>,
}

impl ContractDescriptor {
    /// Descriptor for a root-only contract (stock, forex, spot, index).
    #[must_use]
    pub fn root(symbol: &str, sec_type: SecType, currency: &str, exchange: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            sec_type,
            currency: currency.to_string(),
            exchange: exchange.to_string(),
            primary_exchange: None,
            last_trade_date: None,
            right: None,
            strike: None,
            multiplier: None,
        }
    }
}

/// Codec failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    /// The symbol does not fit the layout of its security type.
    #[error("malformed symbol {symbol}: {reason}")]
    Malformed {
        /// Offending symbol.
        symbol: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The exchange has no broker routing code.
    #[error("unsupported exchange: {0}")]
    UnsupportedExchange(Exchange),
}

impl SymbolError {
    fn malformed(symbol: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

/// Encode a broker contract into the canonical symbol.
///
/// Missing fields encode as empty segments, which `decode` rejects.
#[must_use]
pub fn encode(contract: &ContractDescriptor) -> String {
    let mut fields: Vec<String> = vec![contract.symbol.clone()];

    if matches!(contract.sec_type, SecType::Fut) || contract.sec_type.is_option() {
        fields.push(contract.last_trade_date.clone().unwrap_or_default());
    }

    if contract.sec_type.is_option() {
        fields.push(
            contract
                .right
                .map(|right| right.as_str().to_string())
                .unwrap_or_default(),
        );
        fields.push(contract.strike.map(|s| s.to_string()).unwrap_or_default());
        fields.push(
            contract
                .multiplier
                .map(|m| m.to_string())
                .unwrap_or_default(),
        );
    }

    fields.push(contract.currency.clone());
    fields.push(contract.sec_type.as_str().to_string());

    fields.join(JOIN_SYMBOL)
}

/// Decode a canonical symbol into a broker contract routed to `exchange`.
///
/// # Errors
///
/// Returns [`SymbolError::UnsupportedExchange`] when the exchange has no
/// routing code and [`SymbolError::Malformed`] when the symbol does not
/// match its security type's layout.
pub fn decode(symbol: &str, exchange: Exchange) -> Result<ContractDescriptor, SymbolError> {
    let ib_exchange = exchange
        .ib_code()
        .ok_or(SymbolError::UnsupportedExchange(exchange))?;

    let fields: Vec<&str> = symbol.split(JOIN_SYMBOL).collect();
    if fields.len() < 3 {
        return Err(SymbolError::malformed(
            symbol,
            "expected at least root, currency and security type",
        ));
    }
    if let Some(position) = fields.iter().position(|field| field.is_empty()) {
        return Err(SymbolError::malformed(
            symbol,
            format!("field {position} is empty"),
        ));
    }

    let (head, tail) = fields.split_at(fields.len() - 2);
    let (currency, sec_token) = (tail[0], tail[1]);
    let sec_type = SecType::parse(sec_token).ok_or_else(|| {
        SymbolError::malformed(symbol, format!("unknown security type {sec_token}"))
    })?;

    let mut contract = ContractDescriptor::root(head[0], sec_type, currency, ib_exchange);

    match sec_type {
        SecType::Stk | SecType::Cash | SecType::Cmdty | SecType::Ind | SecType::ContFut => {
            expect_fields(symbol, head, &[1])?;
        }
        SecType::Fut => {
            expect_fields(symbol, head, &[2, 3])?;
            contract.last_trade_date = Some(parse_expiry(symbol, head[1])?);
            if let Some(multiplier) = head.get(2) {
                contract.multiplier = Some(parse_number(symbol, "multiplier", multiplier)?);
            }
        }
        SecType::Opt | SecType::Fop => {
            expect_fields(symbol, head, &[5])?;
            contract.last_trade_date = Some(parse_expiry(symbol, head[1])?);
            contract.right = Some(parse_right(symbol, head[2])?);
            contract.strike = Some(parse_number(symbol, "strike", head[3])?);
            contract.multiplier = Some(parse_number(symbol, "multiplier", head[4])?);
        }
    }

    Ok(contract)
}

fn expect_fields(symbol: &str, head: &[&str], allowed: &[usize]) -> Result<(), SymbolError> {
    if allowed.contains(&head.len()) {
        Ok(())
    } else {
        Err(SymbolError::malformed(
            symbol,
            format!("wrong number of fields ({})", head.len() + 2),
        ))
    }
}

fn parse_expiry(symbol: &str, field: &str) -> Result<String, SymbolError> {
    if field.bytes().all(|b| b.is_ascii_digit()) {
        Ok(field.to_string())
    } else {
        Err(SymbolError::malformed(symbol, format!("bad expiry {field}")))
    }
}

fn parse_right(symbol: &str, field: &str) -> Result<OptionType, SymbolError> {
    match field {
        "C" => Ok(OptionType::Call),
        "P" => Ok(OptionType::Put),
        other => Err(SymbolError::malformed(symbol, format!("bad right {other}"))),
    }
}

/// Only plain decimals are accepted so re-encoding reproduces the input.
fn parse_number(symbol: &str, name: &str, field: &str) -> Result<Decimal, SymbolError> {
    let bad = || SymbolError::malformed(symbol, format!("bad {name} {field}"));

    let (int_part, frac_part) = match field.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (field, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if !digits(int_part) || (int_part.len() > 1 && int_part.starts_with('0')) {
        return Err(bad());
    }
    if frac_part.is_some_and(|frac| !digits(frac)) {
        return Err(bad());
    }

    Decimal::from_str(field).map_err(|_| bad())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("AAPL-USD-STK", Exchange::Smart ; "equity")]
    #[test_case("EUR-USD-CASH", Exchange::Idealpro ; "forex")]
    #[test_case("XAUUSD-USD-CMDTY", Exchange::Smart ; "spot")]
    #[test_case("SPX-USD-IND", Exchange::Cboe ; "index")]
    #[test_case("ES-USD-CONTFUT", Exchange::Globex ; "continuous future")]
    #[test_case("ES-202006-USD-FUT", Exchange::Globex ; "future")]
    #[test_case("ES-2006-C-2430-50-USD-FOP", Exchange::Globex ; "future option")]
    #[test_case("SPY-20240119-P-470.5-100-USD-OPT", Exchange::Smart ; "option with fractional strike")]
    #[test_case("00700-HKD-STK", Exchange::Sehk ; "leading zero root")]
    fn canonical_symbols_round_trip(symbol: &str, exchange: Exchange) {
        let contract = decode(symbol, exchange).unwrap();
        assert_eq!(encode(&contract), symbol);
    }

    #[test]
    fn decode_fills_option_fields() {
        let contract = decode("ES-2006-C-2430-50-USD-FOP", Exchange::Globex).unwrap();

        assert_eq!(contract.symbol, "ES");
        assert_eq!(contract.sec_type, SecType::Fop);
        assert_eq!(contract.currency, "USD");
        assert_eq!(contract.exchange, "GLOBEX");
        assert_eq!(contract.last_trade_date.as_deref(), Some("2006"));
        assert_eq!(contract.right, Some(OptionType::Call));
        assert_eq!(contract.strike, Some(Decimal::new(2430, 0)));
        assert_eq!(contract.multiplier, Some(Decimal::new(50, 0)));
    }

    #[test]
    fn decode_uses_broker_routing_code() {
        let contract = decode("600036-CNH-STK", Exchange::Sse).unwrap();
        assert_eq!(contract.exchange, "SEHKNTL");
    }

    #[test]
    fn future_multiplier_is_accepted_but_not_encoded() {
        let contract = decode("SI-202006-1000-USD-FUT", Exchange::Comex).unwrap();
        assert_eq!(contract.multiplier, Some(Decimal::new(1000, 0)));
        assert_eq!(encode(&contract), "SI-202006-USD-FUT");
    }

    #[test_case("AAPL-USD" ; "too few fields")]
    #[test_case("ES-USD-FUT" ; "future without expiry")]
    #[test_case("ES-2006-C-2430-USD-FOP" ; "option without multiplier")]
    #[test_case("ES-2006-X-2430-50-USD-FOP" ; "bad right")]
    #[test_case("ES-2006-C-abc-50-USD-FOP" ; "non numeric strike")]
    #[test_case("ES-2006-C-2430-5x-USD-FOP" ; "non numeric multiplier")]
    #[test_case("ES-2006-C-+2430-50-USD-FOP" ; "signed strike")]
    #[test_case("ES-2006-C-02430-50-USD-FOP" ; "padded strike")]
    #[test_case("AAPL-X-USD-STK" ; "extra field")]
    #[test_case("AAPL-USD-BOND" ; "unknown security type")]
    #[test_case("-USD-STK" ; "empty root")]
    #[test_case("ES-20a6-USD-FUT" ; "bad expiry")]
    fn malformed_symbols_are_rejected(symbol: &str) {
        let err = decode(symbol, Exchange::Smart).unwrap_err();
        assert!(
            matches!(err, SymbolError::Malformed { .. }),
            "{symbol} gave {err:?}"
        );
    }

    #[test]
    fn unsupported_exchange_is_rejected_before_parsing() {
        let err = decode("IF2006-CNY-FUT", Exchange::Cffex).unwrap_err();
        assert_eq!(err, SymbolError::UnsupportedExchange(Exchange::Cffex));
    }

    #[test]
    fn sec_type_products() {
        assert_eq!(SecType::ContFut.product(), Product::Futures);
        assert_eq!(SecType::Fop.product(), Product::Option);
        assert_eq!(SecType::Cmdty.product(), Product::Spot);
        assert!(SecType::Cash.uses_midpoint_history());
        assert!(!SecType::Stk.uses_midpoint_history());
    }

    fn root() -> impl Strategy<Value = String> {
        "[A-Z0-9]{1,6}"
    }

    fn number() -> impl Strategy<Value = Decimal> {
        (1u32..100_000, 0u32..3).prop_map(|(mantissa, scale)| Decimal::new(i64::from(mantissa), scale))
    }

    fn contract() -> impl Strategy<Value = ContractDescriptor> {
        let plain = (
            root(),
            prop_oneof![
                Just(SecType::Stk),
                Just(SecType::Cash),
                Just(SecType::Cmdty),
                Just(SecType::Ind),
                Just(SecType::ContFut),
            ],
        )
            .prop_map(|(symbol, sec_type)| {
                ContractDescriptor::root(&symbol, sec_type, "USD", "SMART")
            });

        let future = (root(), "[0-9]{6,8}").prop_map(|(symbol, expiry)| {
            let mut contract = ContractDescriptor::root(&symbol, SecType::Fut, "USD", "SMART");
            contract.last_trade_date = Some(expiry);
            contract
        });

        let option = (
            root(),
            "[0-9]{6,8}",
            prop_oneof![Just(OptionType::Call), Just(OptionType::Put)],
            number(),
            number(),
            prop_oneof![Just(SecType::Opt), Just(SecType::Fop)],
        )
            .prop_map(|(symbol, expiry, right, strike, multiplier, sec_type)| {
                let mut contract = ContractDescriptor::root(&symbol, sec_type, "USD", "SMART");
                contract.last_trade_date = Some(expiry);
                contract.right = Some(right);
                contract.strike = Some(strike);
                contract.multiplier = Some(multiplier);
                contract
            });

        prop_oneof![plain, future, option]
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(contract in contract()) {
            let symbol = encode(&contract);
            let decoded = decode(&symbol, Exchange::Smart).unwrap();
            prop_assert_eq!(&decoded, &contract);
            prop_assert_eq!(encode(&decoded), symbol);
        }
    }
}

//! Gateway error taxonomy.

use crate::application::ports::BrokerError;
use crate::domain::instrument::Exchange;
use crate::domain::market::Interval;
use crate::domain::order::OrderType;
use crate::domain::symbol::SymbolError;

/// Errors returned by caller-facing gateway operations.
///
/// Every rejection is also published as a log event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Readiness not yet established for this session; retry later.
    #[error("{operation} rejected: broker session not ready")]
    NotReady {
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// No broker session is open.
    #[error("not connected")]
    NotConnected,

    /// The exchange has no broker routing code.
    #[error("unsupported exchange: {0}")]
    UnsupportedExchange(Exchange),

    /// The order type has no broker equivalent.
    #[error("unsupported order type: {0}")]
    UnsupportedOrderType(OrderType),

    /// The interval has no broker bar size.
    #[error("unsupported interval: {0:?}")]
    UnsupportedInterval(Interval),

    /// The symbol could not be decoded.
    #[error("malformed symbol {symbol}: {reason}")]
    MalformedSymbol {
        /// Offending symbol.
        symbol: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The order reference is not a broker order id.
    #[error("invalid order id: {0}")]
    InvalidOrderId(String),

    /// Error callback outside the reconnection codes.
    #[error("broker error {code}: {message}")]
    Broker {
        /// Broker error code.
        code: i32,
        /// Broker error text.
        message: String,
    },

    /// The session went away while a request was outstanding.
    #[error("transport lost")]
    TransportLost,

    /// The broker failed the in-flight historical request.
    #[error("historical query failed with code {code}: {message}")]
    HistoricalQueryFailed {
        /// Broker error code.
        code: i32,
        /// Broker error text.
        message: String,
    },

    /// Another historical query is still waiting for its reply.
    #[error("a historical query is already in flight")]
    QueryInFlight,

    /// The transport refused a request.
    #[error(transparent)]
    Transport(#[from] BrokerError),
}

impl GatewayError {
    /// Stable label for metrics.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotReady { .. } => "not_ready",
            Self::NotConnected => "not_connected",
            Self::UnsupportedExchange(_) => "unsupported_exchange",
            Self::UnsupportedOrderType(_) => "unsupported_order_type",
            Self::UnsupportedInterval(_) => "unsupported_interval",
            Self::MalformedSymbol { .. } => "malformed_symbol",
            Self::InvalidOrderId(_) => "invalid_order_id",
            Self::Broker { .. } => "broker_error",
            Self::TransportLost => "transport_lost",
            Self::HistoricalQueryFailed { .. } => "historical_query_failed",
            Self::QueryInFlight => "query_in_flight",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<SymbolError> for GatewayError {
    fn from(err: SymbolError) -> Self {
        match err {
            SymbolError::Malformed { symbol, reason } => Self::MalformedSymbol { symbol, reason },
            SymbolError::UnsupportedExchange(exchange) => Self::UnsupportedExchange(exchange),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_errors_keep_their_category() {
        let malformed = SymbolError::Malformed {
            symbol: "X".into(),
            reason: "short".into(),
        };
        assert_eq!(
            GatewayError::from(malformed),
            GatewayError::MalformedSymbol {
                symbol: "X".into(),
                reason: "short".into()
            }
        );
        assert_eq!(
            GatewayError::from(SymbolError::UnsupportedExchange(Exchange::Local)),
            GatewayError::UnsupportedExchange(Exchange::Local)
        );
    }

    #[test]
    fn error_display() {
        let test_cases = [
            (
                GatewayError::NotReady {
                    operation: "send_order",
                },
                "send_order rejected: broker session not ready",
            ),
            (
                GatewayError::UnsupportedOrderType(OrderType::Fak),
                "unsupported order type: FAK",
            ),
            (
                GatewayError::HistoricalQueryFailed {
                    code: 162,
                    message: "no data".into(),
                },
                "historical query failed with code 162: no data",
            ),
            (
                GatewayError::Transport(BrokerError::NotConnected),
                "not connected",
            ),
        ];

        for (error, expected) in test_cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            GatewayError::NotConnected.code(),
            GatewayError::TransportLost.code(),
            GatewayError::QueryInFlight.code(),
            GatewayError::UnsupportedInterval(Interval::Tick).code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}

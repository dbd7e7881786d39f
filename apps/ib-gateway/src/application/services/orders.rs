//! Order & Execution Tracker
//!
//! Two independent callback streams update the same order record:
//!
//! - open-order carries full parameters but no trustworthy status. It
//!   creates records for orders placed elsewhere and refreshes parameters
//!   of known ones without touching their status.
//! - order-status carries filled quantity and status only. Unknown order ids
//!   are dropped, and unmapped status strings never overwrite a known status.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use rust_decimal::Decimal;

use super::gateway::Gateway;
use crate::application::error::GatewayError;
use crate::application::events::LogLevel;
use crate::application::ports::BrokerOrder;
use crate::domain::clock::format_cancel_time;
use crate::domain::order::{CancelRequest, OrderData, OrderRequest, OrderStatus, OrderType};
use crate::domain::symbol;
use crate::infrastructure::metrics;

/// Session-scoped order cache keyed by broker order id.
#[derive(Debug, Default)]
pub struct OrderTracker {
    orders: HashMap<String, OrderData>,
}

impl OrderTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a locally created order.
    pub fn insert(&mut self, order: OrderData) {
        self.orders.insert(order.orderid.clone(), order);
    }

    /// Tracked order by id.
    #[must_use]
    pub fn get(&self, orderid: &str) -> Option<&OrderData> {
        self.orders.get(orderid)
    }

    /// Number of tracked orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Apply an order-status callback. Returns the updated snapshot, or
    /// `None` for an order this session does not know.
    pub fn apply_status(&mut self, orderid: &str, status: &str, filled: Decimal) -> Option<OrderData> {
        let order = self.orders.get_mut(orderid)?;
        order.traded = filled;
        if let Some(mapped) = OrderStatus::from_ib(status) {
            order.status = mapped;
        }
        Some(order.clone())
    }

    /// Apply an open-order callback.
    ///
    /// `reported` carries the broker's parameters; its status is ignored
    /// when the order is already tracked.
    pub fn apply_open(&mut self, reported: OrderData) {
        match self.orders.get_mut(&reported.orderid) {
            Some(order) => {
                order.symbol = reported.symbol;
                order.exchange = reported.exchange;
                order.order_type = reported.order_type;
                order.direction = reported.direction;
                order.price = reported.price;
                order.volume = reported.volume;
            }
            None => {
                self.orders.insert(reported.orderid.clone(), reported);
            }
        }
    }
}

impl Gateway {
    /// Submit an order. Returns the framework order reference.
    ///
    /// A `Submitting` record is tracked and published before the broker
    /// echoes the order.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NotReady`] before the handshake or during an outage.
    /// - [`GatewayError::UnsupportedExchange`] / [`GatewayError::UnsupportedOrderType`]
    ///   for unmappable requests.
    /// - [`GatewayError::MalformedSymbol`] if the symbol does not decode.
    /// - [`GatewayError::Transport`] if the broker refuses the write.
    pub fn send_order(&self, req: &OrderRequest) -> Result<String, GatewayError> {
        let result = self.try_send_order(req);
        match &result {
            Ok(_) => metrics::record_order_submitted(),
            Err(e) => {
                metrics::record_order_rejected(e.code());
                self.log(
                    LogLevel::Warning,
                    format!(
                        "send_order {} {:?} {} @ {} rejected: {e}",
                        req.symbol, req.direction, req.volume, req.price
                    ),
                );
            }
        }
        result
    }

    fn try_send_order(&self, req: &OrderRequest) -> Result<String, GatewayError> {
        let (order_ready, client_id, account) = {
            let conn = self.inner.connection.lock();
            (conn.order_ready, conn.client_id, conn.account.clone())
        };
        if !order_ready {
            return Err(GatewayError::NotReady {
                operation: "send_order",
            });
        }
        if req.exchange.ib_code().is_none() {
            return Err(GatewayError::UnsupportedExchange(req.exchange));
        }
        let order_type_code = req
            .order_type
            .ib_code()
            .ok_or(GatewayError::UnsupportedOrderType(req.order_type))?;
        let action = req
            .direction
            .ib_action()
            .ok_or(GatewayError::UnsupportedOrderType(req.order_type))?;
        let contract = symbol::decode(&req.symbol, req.exchange)?;

        let order_id = self.inner.next_order_id.fetch_add(1, Ordering::SeqCst);

        let ib_order = BrokerOrder {
            order_id,
            client_id,
            action: action.to_string(),
            order_type: order_type_code.to_string(),
            total_quantity: req.volume,
            lmt_price: (req.order_type == OrderType::Limit).then_some(req.price),
            aux_price: (req.order_type == OrderType::Stop).then_some(req.price),
            account,
            outside_rth: true,
        };

        self.inner
            .client
            .place_order(order_id, &contract, &ib_order)?;
        if let Err(e) = self.inner.client.req_ids(1) {
            tracing::warn!(error = %e, "next order id request failed");
        }

        let mut order = req.create_order_data(order_id.to_string(), self.gateway_name());
        order.datetime = Some(self.inner.events.now());
        let vt_orderid = order.vt_orderid();

        self.inner.orders.lock().insert(order.clone());
        self.inner.events.on_order(order);

        tracing::info!(%vt_orderid, symbol = %req.symbol, "order submitted");
        Ok(vt_orderid)
    }

    /// Request cancellation. The outcome arrives later as an order update.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NotReady`] before the handshake or during an outage.
    /// - [`GatewayError::Transport`] if the broker refuses the write.
    pub fn cancel_order(&self, req: &CancelRequest) -> Result<(), GatewayError> {
        let result = self.try_cancel_order(req);
        if let Err(e) = &result {
            self.log(
                LogLevel::Warning,
                format!("cancel_order {} rejected: {e}", req.orderid),
            );
        }
        result
    }

    fn try_cancel_order(&self, req: &CancelRequest) -> Result<(), GatewayError> {
        if !self.inner.connection.lock().order_ready {
            return Err(GatewayError::NotReady {
                operation: "cancel_order",
            });
        }
        let order_id: i32 = req
            .orderid
            .parse()
            .map_err(|_| GatewayError::InvalidOrderId(req.orderid.clone()))?;

        let manual_cancel_time = format_cancel_time(self.inner.events.now());
        self.inner
            .client
            .cancel_order(order_id, &manual_cancel_time)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::Exchange;
    use crate::domain::order::Direction;

    fn order(orderid: &str, status: OrderStatus) -> OrderData {
        OrderData {
            gateway_name: "IB".to_string(),
            symbol: "AAPL-USD-STK".to_string(),
            exchange: Exchange::Smart,
            orderid: orderid.to_string(),
            order_type: OrderType::Limit,
            direction: Direction::Long,
            price: Decimal::new(150, 0),
            volume: Decimal::new(10, 0),
            traded: Decimal::ZERO,
            status,
            datetime: None,
        }
    }

    #[test]
    fn status_for_unknown_order_is_dropped() {
        let mut tracker = OrderTracker::new();
        assert!(tracker.apply_status("1", "Filled", Decimal::ONE).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn unmapped_status_keeps_previous() {
        let mut tracker = OrderTracker::new();
        tracker.insert(order("1", OrderStatus::Submitting));

        let test_cases = [
            ("Submitted", Decimal::ZERO, OrderStatus::NotTraded),
            ("XYZ-unknown", Decimal::new(4, 0), OrderStatus::NotTraded),
            ("Filled", Decimal::new(10, 0), OrderStatus::AllTraded),
        ];

        for (raw, filled, expected) in test_cases {
            let snapshot = tracker.apply_status("1", raw, filled).unwrap();
            assert_eq!(snapshot.status, expected, "after {raw}");
            assert_eq!(snapshot.traded, filled, "after {raw}");
        }
    }

    #[test]
    fn open_order_creates_foreign_record() {
        let mut tracker = OrderTracker::new();

        tracker.apply_open(order("77", OrderStatus::Submitting));

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get("77").unwrap().status, OrderStatus::Submitting);
    }

    #[test]
    fn open_order_does_not_reset_status() {
        let mut tracker = OrderTracker::new();
        tracker.insert(order("5", OrderStatus::Submitting));
        tracker.apply_status("5", "Submitted", Decimal::ZERO);

        let mut reported = order("5", OrderStatus::Submitting);
        reported.price = Decimal::new(151, 0);
        tracker.apply_open(reported);

        let tracked = tracker.get("5").unwrap();
        assert_eq!(tracked.status, OrderStatus::NotTraded);
        assert_eq!(tracked.price, Decimal::new(151, 0));
    }
}

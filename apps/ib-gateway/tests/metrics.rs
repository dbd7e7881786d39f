//! Prometheus export check. Lives in its own test binary because the
//! recorder is process-global.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use rust_decimal::Decimal;

use common::{connect_ready, harness};
use ib_gateway::infrastructure::metrics::get_metrics_handle;
use ib_gateway::{Direction, Exchange, OrderRequest, OrderType, init_metrics};

#[tokio::test]
async fn gateway_activity_is_exported() {
    assert!(get_metrics_handle().is_none());
    let handle = init_metrics().unwrap();
    assert!(init_metrics().is_ok());
    assert!(get_metrics_handle().is_some());

    let h = harness();
    connect_ready(&h).await;
    h.gateway
        .send_order(&OrderRequest {
            symbol: "AAPL-USD-STK".to_string(),
            exchange: Exchange::Smart,
            direction: Direction::Short,
            order_type: OrderType::Market,
            volume: Decimal::ONE,
            price: Decimal::ZERO,
        })
        .unwrap();
    let rejected = h.gateway.send_order(&OrderRequest {
        symbol: "AAPL-USD-STK".to_string(),
        exchange: Exchange::Smart,
        direction: Direction::Long,
        order_type: OrderType::Fok,
        volume: Decimal::ONE,
        price: Decimal::ZERO,
    });
    assert!(rejected.is_err());

    let rendered = handle.render();
    assert!(rendered.contains("ib_gateway_callbacks_total{kind=\"connect_ack\"} 1"));
    assert!(rendered.contains("ib_gateway_orders_submitted_total 1"));
    assert!(rendered.contains("ib_gateway_orders_rejected_total{reason=\"unsupported_order_type\"} 1"));
}

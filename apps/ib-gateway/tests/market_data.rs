//! Market Data, Contract, and Account Integration Tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::str::FromStr;

use rust_decimal::Decimal;

use common::{
    Harness, connect_ready, connect_unready, drain, harness, harness_with_store, next_event,
    settle, wait_until,
};
use ib_gateway::{
    BrokerMessage, ContractData, ContractDescriptor, ContractDetails, Direction, Exchange,
    GatewayEvent, MemoryContractStore, PortfolioUpdate, Product, SecType, SubscribeRequest,
};

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

/// Subscribe and return the market data request id.
async fn subscribe(h: &Harness, symbol: &str, exchange: Exchange) -> i32 {
    let before = h.broker.market_data_requests().len();
    h.gateway.subscribe(SubscribeRequest::new(symbol, exchange));
    wait_until(|| h.broker.market_data_requests().len() == before + 1).await;
    h.broker.market_data_requests()[before].0
}

fn aapl_details() -> ContractDetails {
    ContractDetails {
        contract: ContractDescriptor::root("AAPL", SecType::Stk, "USD", "SMART"),
        long_name: "APPLE INC".to_string(),
        min_tick: dec("0.01"),
        trading_hours: "20240102:0400-20240102:2000".to_string(),
        time_zone_id: "US/Eastern".to_string(),
        local_symbol: "AAPL".to_string(),
    }
}

#[tokio::test]
async fn size_update_publishes_the_quote() {
    let mut h = harness();
    connect_ready(&h).await;
    let req_id = subscribe(&h, "AAPL-USD-STK", Exchange::Smart).await;
    drain(&mut h.events);

    h.broker.push(BrokerMessage::TickPrice {
        req_id,
        field: 1,
        price: dec("189.50"),
    });
    settle().await;
    assert!(
        drain(&mut h.events)
            .iter()
            .all(|e| !matches!(e, GatewayEvent::Tick(_)))
    );

    h.broker.push(BrokerMessage::TickSize {
        req_id,
        field: 0,
        size: dec("300"),
    });
    let tick = next_event(&mut h.events, |e| match e {
        GatewayEvent::Tick(tick) => Some(tick),
        _ => None,
    })
    .await;

    assert_eq!(tick.symbol, "AAPL-USD-STK");
    assert_eq!(tick.bid_price_1, dec("189.50"));
    assert_eq!(tick.bid_volume_1, dec("300"));
    assert_eq!(tick.last_price, Decimal::ZERO);
}

#[tokio::test]
async fn unknown_request_ids_and_fields_are_ignored() {
    let mut h = harness();
    connect_ready(&h).await;
    let req_id = subscribe(&h, "AAPL-USD-STK", Exchange::Smart).await;
    drain(&mut h.events);

    h.broker.push(BrokerMessage::TickSize {
        req_id: req_id + 100,
        field: 0,
        size: dec("1"),
    });
    h.broker.push(BrokerMessage::TickSize {
        req_id,
        field: 45,
        size: dec("1"),
    });
    settle().await;

    assert!(
        drain(&mut h.events)
            .iter()
            .all(|e| !matches!(e, GatewayEvent::Tick(_)))
    );
}

#[tokio::test]
async fn forex_quotes_get_a_midpoint_last_price() {
    let mut h = harness();
    connect_ready(&h).await;
    let req_id = subscribe(&h, "EUR-USD-CASH", Exchange::Idealpro).await;

    h.broker.push(BrokerMessage::TickPrice {
        req_id,
        field: 1,
        price: dec("1.1000"),
    });
    h.broker.push(BrokerMessage::TickPrice {
        req_id,
        field: 2,
        price: dec("1.1002"),
    });
    h.broker.push(BrokerMessage::TickSize {
        req_id,
        field: 3,
        size: dec("1000000"),
    });

    let tick = next_event(&mut h.events, |e| match e {
        GatewayEvent::Tick(tick) => Some(tick),
        _ => None,
    })
    .await;
    assert_eq!(tick.last_price, dec("1.1001"));
    assert_eq!(tick.ask_volume_1, dec("1000000"));
}

#[tokio::test]
async fn contract_name_is_attached_to_quotes() {
    let mut h = harness();
    connect_ready(&h).await;
    let req_id = subscribe(&h, "AAPL-USD-STK", Exchange::Smart).await;
    h.broker.push(BrokerMessage::ContractDetails {
        req_id: req_id - 1,
        details: aapl_details(),
    });
    wait_until(|| h.gateway.contract("AAPL-USD-STK.SMART").is_some()).await;

    h.broker.push(BrokerMessage::TickPrice {
        req_id,
        field: 4,
        price: dec("190"),
    });
    h.broker.push(BrokerMessage::TickSize {
        req_id,
        field: 5,
        size: dec("100"),
    });

    let tick = next_event(&mut h.events, |e| match e {
        GatewayEvent::Tick(tick) => Some(tick),
        _ => None,
    })
    .await;
    assert_eq!(tick.name, "APPLE INC");
    assert_eq!(tick.last_price, dec("190"));
}

#[tokio::test]
async fn new_contracts_are_published_and_saved_once() {
    let mut h = harness();
    connect_ready(&h).await;

    h.broker.push(BrokerMessage::ContractDetails {
        req_id: 1,
        details: aapl_details(),
    });
    let contract = next_event(&mut h.events, |e| match e {
        GatewayEvent::Contract(contract) => Some(contract),
        _ => None,
    })
    .await;
    assert_eq!(contract.vt_symbol(), "AAPL-USD-STK.SMART");
    assert_eq!(contract.product, Product::Equity);
    assert_eq!(contract.size, Decimal::ONE);
    assert_eq!(contract.pricetick, dec("0.01"));
    assert_eq!(contract.option_strike, None);

    h.broker.push(BrokerMessage::ContractDetails {
        req_id: 2,
        details: aapl_details(),
    });
    settle().await;

    assert_eq!(h.store.save_count(), 1);
    assert!(h.store.snapshot().contains_key("AAPL-USD-STK.SMART"));
    assert!(
        drain(&mut h.events)
            .iter()
            .all(|e| !matches!(e, GatewayEvent::Contract(_)))
    );
}

#[tokio::test]
async fn stored_contracts_load_on_connect() {
    let stored = ContractData {
        gateway_name: "IB".to_string(),
        symbol: "MSFT-USD-STK".to_string(),
        exchange: Exchange::Smart,
        name: "MICROSOFT CORP".to_string(),
        product: Product::Equity,
        size: Decimal::ONE,
        pricetick: dec("0.01"),
        trading_hours: String::new(),
        time_zone: "US/Eastern".to_string(),
        local_symbol: "MSFT".to_string(),
        option_strike: None,
        option_type: None,
        option_expiry: None,
    };
    let mut h = harness_with_store(MemoryContractStore::with_contracts([stored.clone()]));

    connect_unready(&h).await;

    let loaded = next_event(&mut h.events, |e| match e {
        GatewayEvent::Contract(contract) => Some(contract),
        _ => None,
    })
    .await;
    assert_eq!(loaded, stored);
    assert_eq!(h.gateway.contract("MSFT-USD-STK.SMART"), Some(stored));
}

#[tokio::test]
async fn account_values_publish_on_account_time() {
    let mut h = harness();
    connect_ready(&h).await;

    let values = [
        ("NetLiquidationByCurrency", "100000.50", "USD"),
        ("AvailableFunds", "80000", "USD"),
        ("MaintMarginReq", "12000", "USD"),
        ("UnrealizedPnL", "-250.25", "USD"),
        ("BuyingPower", "400000", "USD"),
        ("AccountType", "INDIVIDUAL", ""),
        ("NetLiquidation", "n/a", "USD"),
    ];
    for (key, value, currency) in values {
        h.broker.push(BrokerMessage::UpdateAccountValue {
            key: key.to_string(),
            value: value.to_string(),
            currency: currency.to_string(),
            account_name: "DU123".to_string(),
        });
    }
    settle().await;
    assert!(
        drain(&mut h.events)
            .iter()
            .all(|e| !matches!(e, GatewayEvent::Account(_)))
    );

    h.broker
        .push(BrokerMessage::UpdateAccountTime("15:30".to_string()));
    let account = next_event(&mut h.events, |e| match e {
        GatewayEvent::Account(account) => Some(account),
        _ => None,
    })
    .await;

    assert_eq!(account.accountid, "DU123.USD");
    assert_eq!(account.balance, dec("100000.50"));
    assert_eq!(account.available, dec("80000"));
    assert_eq!(account.margin, dec("12000"));
    assert_eq!(account.position_profit, dec("-250.25"));
}

#[tokio::test]
async fn portfolio_lines_become_net_positions() {
    let mut h = harness();
    connect_ready(&h).await;

    let mut contract = ContractDescriptor::root("ES", SecType::Fut, "USD", "CME");
    contract.last_trade_date = Some("20240621".to_string());
    contract.multiplier = Some(dec("50"));
    h.broker.push(BrokerMessage::UpdatePortfolio(PortfolioUpdate {
        contract,
        position: dec("-2"),
        market_price: dec("5010"),
        market_value: dec("-501000"),
        average_cost: dec("250000"),
        unrealized_pnl: dec("-1000"),
        realized_pnl: Decimal::ZERO,
        account_name: "DU123".to_string(),
    }));

    let position = next_event(&mut h.events, |e| match e {
        GatewayEvent::Position(position) => Some(position),
        _ => None,
    })
    .await;
    assert_eq!(position.direction, Direction::Net);
    assert_eq!(position.exchange, Exchange::Cme);
    assert_eq!(position.volume, dec("-2"));
    assert_eq!(position.price, dec("5000"));
    assert_eq!(position.pnl, dec("-1000"));
}

#[tokio::test]
async fn quotes_restart_after_data_loss() {
    let mut h = harness();
    connect_ready(&h).await;
    let old_id = subscribe(&h, "AAPL-USD-STK", Exchange::Smart).await;
    h.broker.clear_sent();

    h.broker.push(BrokerMessage::Error {
        req_id: -1,
        code: 1101,
        message: "data lost".to_string(),
    });
    wait_until(|| h.broker.market_data_requests().len() == 1).await;
    let new_id = h.broker.market_data_requests()[0].0;
    assert_ne!(new_id, old_id);
    drain(&mut h.events);

    h.broker.push(BrokerMessage::TickSize {
        req_id: old_id,
        field: 0,
        size: dec("1"),
    });
    h.broker.push(BrokerMessage::TickSize {
        req_id: new_id,
        field: 0,
        size: dec("2"),
    });

    let tick = next_event(&mut h.events, |e| match e {
        GatewayEvent::Tick(tick) => Some(tick),
        _ => None,
    })
    .await;
    assert_eq!(tick.bid_volume_1, dec("2"));
}

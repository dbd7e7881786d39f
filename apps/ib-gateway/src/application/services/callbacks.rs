//! Broker callback handlers.
//!
//! Everything here runs on the receive loop, one callback at a time.

use std::str::FromStr;
use std::sync::atomic::Ordering;

use chrono::DateTime;
use rust_decimal::Decimal;

use super::connection::{
    CONNECTIVITY_LOST, CONNECTIVITY_RESTORED_DATA_KEPT, CONNECTIVITY_RESTORED_DATA_LOST,
};
use super::gateway::Gateway;
use crate::application::error::GatewayError;
use crate::application::events::LogLevel;
use crate::application::ports::{
    BrokerBar, BrokerCallbacks, BrokerOrder, ContractDetails, Execution, PortfolioUpdate,
};
use crate::domain::clock::parse_broker_time;
use crate::domain::instrument::Exchange;
use crate::domain::market::{AccountData, ContractData, PositionData};
use crate::domain::order::{Direction, OrderData, OrderStatus, OrderType, TradeData};
use crate::domain::symbol::{self, ContractDescriptor};
use crate::infrastructure::metrics;

/// Error codes in this range are notices, not failures.
const INFORMATIONAL_CODES: std::ops::RangeInclusive<i32> = 2000..=2999;

/// Account value field a broker key updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountField {
    Balance,
    Available,
    Margin,
    PositionProfit,
}

impl AccountField {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "NetLiquidationByCurrency" | "NetLiquidation" => Some(Self::Balance),
            "UnrealizedPnL" => Some(Self::PositionProfit),
            "AvailableFunds" => Some(Self::Available),
            "MaintMarginReq" => Some(Self::Margin),
            _ => None,
        }
    }

    fn write(self, account: &mut AccountData, value: Decimal) {
        match self {
            Self::Balance => account.balance = value,
            Self::Available => account.available = value,
            Self::Margin => account.margin = value,
            Self::PositionProfit => account.position_profit = value,
        }
    }
}

/// Framework exchange for a contract reported by the broker.
///
/// Routing exchange first, then primary listing, then SMART when the broker
/// left both empty. `None` for a code outside the routing table.
fn resolve_exchange(contract: &ContractDescriptor) -> Option<Exchange> {
    if !contract.exchange.is_empty() {
        return Exchange::from_ib(&contract.exchange);
    }
    match contract.primary_exchange.as_deref() {
        Some(primary) if !primary.is_empty() => Exchange::from_ib(primary),
        _ => Some(Exchange::Smart),
    }
}

/// Exchange for a fill or an open order. Executions report the venue, which
/// need not be a routing code, so unknown codes fall back to SMART.
fn reported_exchange(contract: &ContractDescriptor) -> Exchange {
    resolve_exchange(contract).unwrap_or_else(|| {
        tracing::debug!(exchange = %contract.exchange, "unmapped venue reported as SMART");
        Exchange::Smart
    })
}

fn multiplier_or_one(contract: &ContractDescriptor) -> Decimal {
    contract
        .multiplier
        .filter(|m| !m.is_zero())
        .unwrap_or(Decimal::ONE)
}

/// Last non-empty code in a comma separated account list.
fn last_account(accounts_list: &str) -> Option<&str> {
    accounts_list
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .last()
}

impl Gateway {
    fn unsupported_contract(&self, what: &str, contract: &ContractDescriptor) {
        self.log(
            LogLevel::Warning,
            format!(
                "{what}: unsupported exchange {} for {}",
                contract.exchange,
                symbol::encode(contract)
            ),
        );
    }

    fn contract_record(&self, details: &ContractDetails, exchange: Exchange) -> ContractData {
        let contract = &details.contract;
        let is_option = contract.sec_type.is_option();

        ContractData {
            gateway_name: self.gateway_name().to_string(),
            symbol: symbol::encode(contract),
            exchange,
            name: details.long_name.clone(),
            product: contract.sec_type.product(),
            size: multiplier_or_one(contract),
            pricetick: details.min_tick,
            trading_hours: details.trading_hours.clone(),
            time_zone: details.time_zone_id.clone(),
            local_symbol: details.local_symbol.clone(),
            option_strike: contract.strike.filter(|_| is_option),
            option_type: contract.right.filter(|_| is_option),
            option_expiry: contract
                .last_trade_date
                .clone()
                .filter(|_| is_option),
        }
    }

    fn save_contracts(&self) {
        let result = {
            let contracts = self.inner.contracts.read();
            self.inner.store.save(&contracts)
        };
        if let Err(e) = result {
            self.log(LogLevel::Error, format!("contract store save failed: {e}"));
        }
    }

    fn load_contracts(&self) {
        let table = match self.inner.store.load() {
            Ok(table) => table,
            Err(e) => {
                self.log(LogLevel::Error, format!("contract store load failed: {e}"));
                return;
            }
        };

        let count = table.len();
        {
            let mut contracts = self.inner.contracts.write();
            contracts.extend(table.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        for contract in table.into_values() {
            self.inner.events.on_contract(contract);
        }
        tracing::debug!(count, "contracts loaded");
    }
}

impl BrokerCallbacks for Gateway {
    fn connect_ack(&self) {
        self.inner.connection.lock().on_connect_ack();
        self.load_contracts();
        self.log(LogLevel::Info, "connected to broker");
    }

    fn connection_closed(&self) {
        self.inner.connection.lock().on_closed();
        self.inner.ticks.lock().clear();
        self.inner.history.fail_pending(GatewayError::TransportLost);
        self.log(LogLevel::Warning, "broker closed the connection");
    }

    fn next_valid_id(&self, order_id: i32) {
        self.inner.next_order_id.fetch_max(order_id, Ordering::SeqCst);

        let handshake = self.inner.connection.lock().on_next_valid_id();
        if handshake {
            self.inner.ticks.lock().clear();
            let count = self.inner.subscriptions.resubscribe_all();
            self.start_subscription_worker();
            tracing::info!(order_id, resubscribed = count, "broker session ready");
        }

        if let Err(e) = self.inner.client.req_current_time() {
            tracing::warn!(error = %e, "server time request failed");
        }
    }

    fn current_time(&self, time: i64) {
        match DateTime::from_timestamp(time, 0) {
            Some(server) => {
                let local = server.with_timezone(&self.inner.options.reporting_tz);
                self.log(LogLevel::Info, format!("server time: {local}"));
            }
            None => tracing::warn!(time, "server time out of range"),
        }
    }

    fn error(&self, req_id: i32, code: i32, message: &str) {
        if INFORMATIONAL_CODES.contains(&code) {
            self.log(LogLevel::Info, format!("broker notice {code}: {message}"));
            return;
        }

        let failed_query = self.inner.history.fail_matching(
            req_id,
            GatewayError::HistoricalQueryFailed {
                code,
                message: message.to_string(),
            },
        );
        if failed_query {
            tracing::debug!(req_id, code, "historical query failed by broker");
        }

        match code {
            CONNECTIVITY_LOST => {
                self.inner.connection.lock().on_connectivity_lost();
                self.log(LogLevel::Warning, format!("connectivity lost ({code}): {message}"));
            }
            CONNECTIVITY_RESTORED_DATA_LOST | CONNECTIVITY_RESTORED_DATA_KEPT => {
                if !self.inner.connection.lock().on_connectivity_restored() {
                    tracing::debug!(code, "connectivity notice before handshake ignored");
                    return;
                }
                if code == CONNECTIVITY_RESTORED_DATA_LOST {
                    self.inner.ticks.lock().clear();
                    let count = self.inner.subscriptions.resubscribe_all();
                    self.log(
                        LogLevel::Info,
                        format!("connectivity restored, re-subscribing {count} symbols"),
                    );
                } else {
                    self.log(LogLevel::Info, "connectivity restored, data kept");
                }
                self.start_subscription_worker();
            }
            _ => {
                let err = GatewayError::Broker {
                    code,
                    message: message.to_string(),
                };
                self.log(LogLevel::Error, format!("req {req_id}: {err}"));
            }
        }
    }

    fn tick_price(&self, req_id: i32, field: i32, price: Decimal) {
        let now = self.inner.events.now();
        let contracts = &self.inner.contracts;
        self.inner
            .ticks
            .lock()
            .apply_price(req_id, field, price, now, |vt_symbol| {
                contracts.read().get(vt_symbol).map(|c| c.name.clone())
            });
    }

    fn tick_size(&self, req_id: i32, field: i32, size: Decimal) {
        let now = self.inner.events.now();
        let snapshot = self.inner.ticks.lock().apply_size(req_id, field, size, now);
        if let Some(tick) = snapshot {
            metrics::record_tick_emitted();
            self.inner.events.on_tick(tick);
        }
    }

    fn order_status(&self, order_id: i32, status: &str, filled: Decimal, _remaining: Decimal) {
        let updated = self
            .inner
            .orders
            .lock()
            .apply_status(&order_id.to_string(), status, filled);

        match updated {
            Some(order) => self.inner.events.on_order(order),
            None => tracing::debug!(order_id, status, "status for unknown order dropped"),
        }
    }

    fn open_order(&self, order_id: i32, contract: &ContractDescriptor, order: &BrokerOrder) {
        let exchange = reported_exchange(contract);
        let Some(order_type) = OrderType::from_ib(&order.order_type) else {
            self.log(
                LogLevel::Warning,
                format!("open order {order_id}: unsupported order type {}", order.order_type),
            );
            return;
        };
        let Some(direction) = Direction::from_ib(&order.action) else {
            self.log(
                LogLevel::Warning,
                format!("open order {order_id}: unsupported action {}", order.action),
            );
            return;
        };

        let price = match order_type {
            OrderType::Stop => order.aux_price,
            _ => order.lmt_price,
        }
        .unwrap_or(Decimal::ZERO);

        let reported = OrderData {
            gateway_name: self.gateway_name().to_string(),
            symbol: symbol::encode(contract),
            exchange,
            orderid: order_id.to_string(),
            order_type,
            direction,
            price,
            volume: order.total_quantity,
            traded: Decimal::ZERO,
            status: OrderStatus::Submitting,
            datetime: Some(self.inner.events.now()),
        };
        self.inner.orders.lock().apply_open(reported);
    }

    fn exec_details(&self, _req_id: i32, contract: &ContractDescriptor, execution: &Execution) {
        let exchange = reported_exchange(contract);
        let Some(direction) = Direction::from_ib(&execution.side) else {
            self.log(
                LogLevel::Warning,
                format!("execution {}: unknown side {}", execution.exec_id, execution.side),
            );
            return;
        };

        let datetime = parse_broker_time(&execution.time, self.inner.options.reporting_tz)
            .unwrap_or_else(|| self.inner.events.now());

        let trade = TradeData {
            gateway_name: self.gateway_name().to_string(),
            symbol: symbol::encode(contract),
            exchange,
            orderid: execution.order_id.to_string(),
            tradeid: execution.exec_id.clone(),
            direction,
            price: execution.price,
            volume: execution.shares,
            datetime,
        };
        tracing::info!(tradeid = %trade.tradeid, orderid = %trade.orderid, "execution");
        self.inner.events.on_trade(trade);
    }

    fn update_account_value(&self, key: &str, value: &str, currency: &str, account_name: &str) {
        if currency.is_empty() {
            return;
        }
        let Some(field) = AccountField::from_key(key) else {
            return;
        };
        let Ok(value) = Decimal::from_str(value) else {
            tracing::debug!(key, value, "non-numeric account value ignored");
            return;
        };

        let accountid = format!("{account_name}.{currency}");
        let mut accounts = self.inner.accounts.lock();
        let account = accounts
            .entry(accountid.clone())
            .or_insert_with(|| AccountData::new(self.gateway_name(), accountid));
        field.write(account, value);
    }

    fn update_portfolio(&self, update: &PortfolioUpdate) {
        let Some(exchange) = resolve_exchange(&update.contract) else {
            self.unsupported_contract("portfolio", &update.contract);
            return;
        };

        let position = PositionData {
            gateway_name: self.gateway_name().to_string(),
            symbol: symbol::encode(&update.contract),
            exchange,
            direction: Direction::Net,
            volume: update.position,
            price: update.average_cost / multiplier_or_one(&update.contract),
            pnl: update.unrealized_pnl,
        };
        self.inner.events.on_position(position);
    }

    fn update_account_time(&self, _time_stamp: &str) {
        let snapshot: Vec<AccountData> = self.inner.accounts.lock().values().cloned().collect();
        for account in snapshot {
            self.inner.events.on_account(account);
        }
    }

    fn managed_accounts(&self, accounts_list: &str) {
        let account = {
            let mut conn = self.inner.connection.lock();
            if conn.account.is_empty() {
                if let Some(code) = last_account(accounts_list) {
                    conn.account = code.to_string();
                }
            }
            conn.account.clone()
        };

        self.log(LogLevel::Info, format!("managed accounts: {accounts_list}"));
        if account.is_empty() {
            return;
        }

        if let Err(e) = self.inner.client.req_account_updates(true, &account) {
            self.log(
                LogLevel::Error,
                format!("account updates for {account} failed: {e}"),
            );
        }
    }

    fn contract_details(&self, req_id: i32, details: &ContractDetails) {
        let Some(exchange) = resolve_exchange(&details.contract) else {
            self.unsupported_contract("contract details", &details.contract);
            return;
        };

        let record = self.contract_record(details, exchange);
        let vt_symbol = record.vt_symbol();

        let is_new = {
            let mut contracts = self.inner.contracts.write();
            if contracts.contains_key(&vt_symbol) {
                false
            } else {
                contracts.insert(vt_symbol.clone(), record.clone());
                true
            }
        };
        if !is_new {
            return;
        }

        tracing::debug!(req_id, %vt_symbol, "contract discovered");
        self.inner.events.on_contract(record);
        self.save_contracts();
    }

    fn historical_data(&self, req_id: i32, bar: &BrokerBar) {
        self.on_historical_bar(req_id, bar);
    }

    fn historical_data_end(&self, req_id: i32, _start: &str, _end: &str) {
        self.on_historical_end(req_id);
    }
}

//! Shared test harness: a scripted broker and gateway setup helpers.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use ib_gateway::{
    BrokerClient, BrokerError, BrokerMessage, BrokerOrder, BrokerReceiver, ContractDescriptor,
    EventReceiver, Gateway, GatewayEvent, GatewayOptions, HistoricalDataRequest,
    MemoryContractStore, domain::symbol,
};

/// Outbound request as recorded by [`FakeBroker`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Connect {
        host: String,
        port: u16,
        client_id: i32,
    },
    Disconnect,
    CurrentTime,
    Ids(i32),
    ContractDetails {
        req_id: i32,
        symbol: String,
    },
    MktData {
        req_id: i32,
        symbol: String,
    },
    PlaceOrder {
        order_id: i32,
        symbol: String,
        order: BrokerOrder,
    },
    CancelOrder {
        order_id: i32,
        manual_cancel_time: String,
    },
    Historical {
        req_id: i32,
        symbol: String,
        request: HistoricalDataRequest,
    },
    AccountUpdates {
        subscribe: bool,
        account: String,
    },
}

/// Broker transport that records requests and lets the test inject callbacks.
#[derive(Default)]
pub struct FakeBroker {
    sent: Mutex<Vec<Sent>>,
    callbacks: Mutex<Option<mpsc::UnboundedSender<BrokerMessage>>>,
    connected: AtomicBool,
    refuse_connect: AtomicBool,
    fail_market_data: AtomicBool,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a callback on the current session.
    pub fn push(&self, message: BrokerMessage) {
        self.callbacks
            .lock()
            .as_ref()
            .expect("no open session")
            .send(message)
            .expect("receive loop gone");
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    /// Market data requests sent so far, as encoded symbols.
    pub fn market_data_requests(&self) -> Vec<(i32, String)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::MktData { req_id, symbol } => Some((*req_id, symbol.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Sent) -> bool) -> usize {
        self.sent.lock().iter().filter(|s| pred(s)).count()
    }

    /// Simulate a dead socket that produced no callback.
    pub fn kill_socket(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn socket_open(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Make market data requests fail as if the write did not go through.
    pub fn fail_market_data(&self, fail: bool) {
        self.fail_market_data.store(fail, Ordering::SeqCst);
    }

    fn record(&self, sent: Sent) -> Result<(), BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        self.sent.lock().push(sent);
        Ok(())
    }
}

#[async_trait]
impl BrokerClient for FakeBroker {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
    ) -> Result<BrokerReceiver, BrokerError> {
        self.sent.lock().push(Sent::Connect {
            host: host.to_string(),
            port,
            client_id,
        });
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(BrokerError::ConnectionError {
                message: "connection refused".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.callbacks.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    fn disconnect(&self) {
        self.sent.lock().push(Sent::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        self.callbacks.lock().take();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn req_current_time(&self) -> Result<(), BrokerError> {
        self.record(Sent::CurrentTime)
    }

    fn req_ids(&self, num_ids: i32) -> Result<(), BrokerError> {
        self.record(Sent::Ids(num_ids))
    }

    fn req_contract_details(
        &self,
        req_id: i32,
        contract: &ContractDescriptor,
    ) -> Result<(), BrokerError> {
        self.record(Sent::ContractDetails {
            req_id,
            symbol: symbol::encode(contract),
        })
    }

    fn req_mkt_data(&self, req_id: i32, contract: &ContractDescriptor) -> Result<(), BrokerError> {
        if self.fail_market_data.load(Ordering::SeqCst) {
            return Err(BrokerError::RequestFailed {
                message: "broken pipe".to_string(),
            });
        }
        self.record(Sent::MktData {
            req_id,
            symbol: symbol::encode(contract),
        })
    }

    fn place_order(
        &self,
        order_id: i32,
        contract: &ContractDescriptor,
        order: &BrokerOrder,
    ) -> Result<(), BrokerError> {
        self.record(Sent::PlaceOrder {
            order_id,
            symbol: symbol::encode(contract),
            order: order.clone(),
        })
    }

    fn cancel_order(&self, order_id: i32, manual_cancel_time: &str) -> Result<(), BrokerError> {
        self.record(Sent::CancelOrder {
            order_id,
            manual_cancel_time: manual_cancel_time.to_string(),
        })
    }

    fn req_historical_data(
        &self,
        req_id: i32,
        contract: &ContractDescriptor,
        request: &HistoricalDataRequest,
    ) -> Result<(), BrokerError> {
        self.record(Sent::Historical {
            req_id,
            symbol: symbol::encode(contract),
            request: request.clone(),
        })
    }

    fn req_account_updates(&self, subscribe: bool, account: &str) -> Result<(), BrokerError> {
        self.record(Sent::AccountUpdates {
            subscribe,
            account: account.to_string(),
        })
    }
}

pub struct Harness {
    pub gateway: Gateway,
    pub broker: Arc<FakeBroker>,
    pub store: Arc<MemoryContractStore>,
    pub events: EventReceiver,
}

pub fn options() -> GatewayOptions {
    GatewayOptions {
        reporting_tz: Tz::UTC,
        subscription_poll_interval: Duration::from_millis(10),
        ..GatewayOptions::default()
    }
}

pub fn harness() -> Harness {
    harness_with_store(MemoryContractStore::new())
}

pub fn harness_with_store(store: MemoryContractStore) -> Harness {
    let broker = FakeBroker::new();
    let store = Arc::new(store);
    let (gateway, events) = Gateway::new(options(), broker.clone(), store.clone());
    Harness {
        gateway,
        broker,
        store,
        events,
    }
}

/// Connect and acknowledge, without completing the handshake.
pub async fn connect_unready(h: &Harness) {
    h.gateway.connect("127.0.0.1", 7497, 1, "DU123").await.unwrap();
    h.broker.push(BrokerMessage::ConnectAck);
    wait_until(|| h.gateway.connection().status).await;
}

/// Connect and complete the handshake.
pub async fn connect_ready(h: &Harness) {
    connect_unready(h).await;
    h.broker.push(BrokerMessage::NextValidId(1));
    wait_until(|| h.gateway.connection().order_ready).await;
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Let spawned tasks run for a while.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}

/// Next event matching `pred`, skipping others.
pub async fn next_event<T>(
    events: &mut EventReceiver,
    mut pred: impl FnMut(GatewayEvent) -> Option<T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if let Some(found) = pred(event) {
                return found;
            }
        }
    })
    .await
    .expect("no matching event in time")
}

/// Events already queued.
pub fn drain(events: &mut EventReceiver) -> Vec<GatewayEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

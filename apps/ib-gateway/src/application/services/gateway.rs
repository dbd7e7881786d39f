//! Gateway session object.
//!
//! [`Gateway`] is a cheap handle around one shared session. All mutable
//! session state lives here, so independent gateways never share anything.
//! Operations are split by concern across the sibling modules:
//!
//! - `connection`: connect, close, health check, receive loop
//! - `subscription`: subscribe and the subscription worker
//! - `orders`: send and cancel
//! - `history`: historical query bridge
//! - `callbacks`: the broker callback handlers

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::connection::{ConnectionState, LifecyclePhase};
use super::history::HistoryBridge;
use super::orders::OrderTracker;
use super::subscription::SubscriptionQueue;
use crate::application::events::{EventEmitter, EventReceiver, LogLevel};
use crate::application::ports::{BrokerClient, ContractStore, ContractTable};
use crate::domain::market::{AccountData, ContractData};
use crate::domain::order::OrderData;
use crate::domain::tick::TickBook;

/// Default name stamped on records.
pub const DEFAULT_GATEWAY_NAME: &str = "IB";

/// Behavior knobs for one gateway.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Name stamped on every published record.
    pub gateway_name: String,
    /// Zone all published times are expressed in.
    pub reporting_tz: Tz,
    /// How long the subscription worker waits on an empty queue or a
    /// readiness gate before looking again.
    pub subscription_poll_interval: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            gateway_name: DEFAULT_GATEWAY_NAME.to_string(),
            reporting_tz: Tz::UTC,
            subscription_poll_interval: Duration::from_secs(1),
        }
    }
}

/// Read-only view of the connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    /// Lifecycle phase.
    pub phase: LifecyclePhase,
    /// Transport session open.
    pub status: bool,
    /// Orders and cancels accepted.
    pub order_ready: bool,
    /// Subscriptions processed.
    pub data_ready: bool,
    /// Account in use.
    pub account: String,
}

pub(super) struct Session {
    pub(super) options: GatewayOptions,
    pub(super) client: Arc<dyn BrokerClient>,
    pub(super) store: Arc<dyn ContractStore>,
    pub(super) events: EventEmitter,
    pub(super) connection: Mutex<ConnectionState>,
    pub(super) req_id: AtomicI32,
    pub(super) next_order_id: AtomicI32,
    pub(super) contracts: RwLock<ContractTable>,
    pub(super) orders: Mutex<OrderTracker>,
    pub(super) ticks: Mutex<TickBook>,
    pub(super) accounts: Mutex<HashMap<String, AccountData>>,
    pub(super) subscriptions: SubscriptionQueue,
    pub(super) history: HistoryBridge,
    pub(super) receive_task: Mutex<Option<JoinHandle<()>>>,
}

/// Broker gateway handle.
///
/// Clones share the same session.
#[derive(Clone)]
pub struct Gateway {
    pub(super) inner: Arc<Session>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("gateway_name", &self.inner.options.gateway_name)
            .field("connection", &*self.inner.connection.lock())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway and the event stream it publishes to.
    #[must_use]
    pub fn new(
        options: GatewayOptions,
        client: Arc<dyn BrokerClient>,
        store: Arc<dyn ContractStore>,
    ) -> (Self, EventReceiver) {
        let (events, event_rx) = EventEmitter::channel(&options.gateway_name, options.reporting_tz);

        let session = Session {
            options,
            client,
            store,
            events,
            connection: Mutex::new(ConnectionState::default()),
            req_id: AtomicI32::new(0),
            next_order_id: AtomicI32::new(0),
            contracts: RwLock::new(HashMap::new()),
            orders: Mutex::new(OrderTracker::new()),
            ticks: Mutex::new(TickBook::new()),
            accounts: Mutex::new(HashMap::new()),
            subscriptions: SubscriptionQueue::new(),
            history: HistoryBridge::new(),
            receive_task: Mutex::new(None),
        };

        (
            Self {
                inner: Arc::new(session),
            },
            event_rx,
        )
    }

    /// Gateway name.
    #[must_use]
    pub fn gateway_name(&self) -> &str {
        &self.inner.options.gateway_name
    }

    /// Current connection state.
    #[must_use]
    pub fn connection(&self) -> ConnectionSnapshot {
        let conn = self.inner.connection.lock();
        ConnectionSnapshot {
            phase: conn.phase,
            status: conn.status,
            order_ready: conn.order_ready,
            data_ready: conn.data_ready,
            account: conn.account.clone(),
        }
    }

    /// Tracked order by broker order id.
    #[must_use]
    pub fn order(&self, orderid: &str) -> Option<OrderData> {
        self.inner.orders.lock().get(orderid).cloned()
    }

    /// Known contract by `vt_symbol`.
    #[must_use]
    pub fn contract(&self, vt_symbol: &str) -> Option<ContractData> {
        self.inner.contracts.read().get(vt_symbol).cloned()
    }

    /// `vt_symbol`s currently tracked for re-subscription.
    #[must_use]
    pub fn subscribed_symbols(&self) -> Vec<String> {
        let mut symbols = self.inner.subscriptions.tracked();
        symbols.sort();
        symbols
    }

    /// Whether a subscription worker is alive.
    #[must_use]
    pub fn subscription_worker_running(&self) -> bool {
        self.inner.subscriptions.worker_running()
    }

    pub(super) fn next_req_id(&self) -> i32 {
        self.inner.req_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(super) fn log(&self, level: LogLevel, msg: impl Into<String>) {
        self.inner.events.write_log(level, msg);
    }
}

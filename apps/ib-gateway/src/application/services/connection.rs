//! Connection Lifecycle Manager
//!
//! ```text
//! Disconnected ──connect──► Connecting ──ack──► ConnectedUnready ──next id──► Ready
//!      ▲                                                                  │  ▲
//!      └──────────── close / connection closed ──────── Degraded ◄─1100───┘  │
//!                                                          └──1101/1102──────┘
//! ```
//!
//! Readiness never survives a connect-ack: a fresh session must complete the
//! handshake (first next-valid-id) before orders or subscriptions flow.

use crate::application::error::GatewayError;
use crate::application::events::LogLevel;
use crate::application::ports::{BrokerCallbacks, BrokerReceiver};
use crate::infrastructure::metrics;

use super::gateway::Gateway;

/// Broker notice: connectivity between TWS and the broker lost.
pub const CONNECTIVITY_LOST: i32 = 1100;
/// Broker notice: connectivity restored, market data subscriptions lost.
pub const CONNECTIVITY_RESTORED_DATA_LOST: i32 = 1101;
/// Broker notice: connectivity restored, subscriptions kept.
pub const CONNECTIVITY_RESTORED_DATA_KEPT: i32 = 1102;

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    /// No session.
    #[default]
    Disconnected,
    /// Transport opening, no ack yet.
    Connecting,
    /// Acknowledged, waiting for the handshake.
    ConnectedUnready,
    /// Orders and data flowing.
    Ready,
    /// Socket open but the broker lost its upstream connectivity.
    Degraded,
}

impl LifecyclePhase {
    /// Label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::ConnectedUnready => "connected_unready",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
        }
    }
}

/// Connection parameters reused by the health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// TWS / Gateway host.
    pub host: String,
    /// TWS / Gateway port.
    pub port: u16,
    /// API client id.
    pub client_id: i32,
}

/// Connection state. One per gateway.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    /// Last host used.
    pub host: String,
    /// Last port used.
    pub port: u16,
    /// Last client id used.
    pub client_id: i32,
    /// Trading account; adopted from the managed-accounts list when empty.
    pub account: String,
    /// Transport session acknowledged and not yet closed.
    pub status: bool,
    /// Orders and cancels accepted.
    pub order_ready: bool,
    /// Subscription requests processed.
    pub data_ready: bool,
    /// Lifecycle phase.
    pub phase: LifecyclePhase,
    handshake_done: bool,
    auto_reconnect: bool,
}

impl ConnectionState {
    /// Record parameters and move to `Connecting`.
    ///
    /// Returns false (and changes nothing) if a session is already open or
    /// opening.
    pub fn begin_connect(&mut self, host: &str, port: u16, client_id: i32, account: &str) -> bool {
        if self.status || self.phase == LifecyclePhase::Connecting {
            return false;
        }
        self.host = host.to_string();
        self.port = port;
        self.client_id = client_id;
        self.account = account.to_string();
        self.auto_reconnect = true;
        self.phase = LifecyclePhase::Connecting;
        true
    }

    /// Parameters for a health-check reconnect, if one is allowed.
    #[must_use]
    pub fn reconnect_params(&self) -> Option<ConnectParams> {
        self.auto_reconnect.then(|| ConnectParams {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id,
        })
    }

    /// Transport acknowledged. Readiness is reset until the handshake.
    pub fn on_connect_ack(&mut self) {
        self.status = true;
        self.order_ready = false;
        self.data_ready = false;
        self.handshake_done = false;
        self.phase = LifecyclePhase::ConnectedUnready;
    }

    /// Next valid id received. Returns true only for the first one of a
    /// session, which completes the handshake.
    pub fn on_next_valid_id(&mut self) -> bool {
        if self.handshake_done || !self.status {
            return false;
        }
        self.handshake_done = true;
        self.set_ready(true);
        self.phase = LifecyclePhase::Ready;
        true
    }

    /// Error 1100.
    pub fn on_connectivity_lost(&mut self) {
        self.set_ready(false);
        if self.status {
            self.phase = LifecyclePhase::Degraded;
        }
    }

    /// Error 1101 or 1102. Returns true when readiness was restored.
    ///
    /// Ignored without a session, and before the session's handshake: the
    /// handshake restores readiness and re-subscribes by itself.
    pub fn on_connectivity_restored(&mut self) -> bool {
        if !self.status || !self.handshake_done {
            return false;
        }
        self.set_ready(true);
        self.phase = LifecyclePhase::Ready;
        true
    }

    /// Session ended, by the broker or locally.
    pub fn on_closed(&mut self) {
        self.status = false;
        self.handshake_done = false;
        self.set_ready(false);
        self.phase = LifecyclePhase::Disconnected;
    }

    /// Opening the transport failed.
    pub fn on_connect_failed(&mut self) {
        if self.phase == LifecyclePhase::Connecting {
            self.phase = LifecyclePhase::Disconnected;
        }
    }

    /// Explicit close: no health-check reconnects afterwards.
    pub fn disable_reconnect(&mut self) {
        self.auto_reconnect = false;
    }

    fn set_ready(&mut self, ready: bool) {
        self.order_ready = ready;
        self.data_ready = ready;
    }
}

impl Gateway {
    /// Open a broker session.
    ///
    /// No-op if a session is already open or opening.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the socket cannot be opened.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
        account: &str,
    ) -> Result<(), GatewayError> {
        if !self
            .inner
            .connection
            .lock()
            .begin_connect(host, port, client_id, account)
        {
            tracing::debug!(host, port, "connect ignored, session already open");
            return Ok(());
        }

        self.open_transport(host, port, client_id).await
    }

    /// Close the broker session. Idempotent.
    pub fn close(&self) {
        let was_open = {
            let mut conn = self.inner.connection.lock();
            conn.disable_reconnect();
            let was_open = conn.status || conn.phase == LifecyclePhase::Connecting;
            if was_open {
                conn.on_closed();
            }
            was_open
        };

        if !was_open {
            return;
        }

        self.teardown();
        self.log(LogLevel::Info, "connection closed");
    }

    /// Health check, driven by a timer.
    ///
    /// If the transport reports the socket down, tear the session down and
    /// reconnect with the last parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the reconnect fails.
    pub async fn check_connection(&self) -> Result<(), GatewayError> {
        if self.inner.client.is_connected() {
            return Ok(());
        }

        let (params, was_open) = {
            let mut conn = self.inner.connection.lock();
            let Some(params) = conn.reconnect_params() else {
                return Ok(());
            };
            let was_open = conn.status;
            if was_open {
                conn.on_closed();
            }
            conn.phase = LifecyclePhase::Connecting;
            (params, was_open)
        };

        if was_open {
            self.teardown();
        }

        metrics::record_reconnect();
        self.log(
            LogLevel::Warning,
            format!(
                "transport down, reconnecting to {}:{} as client {}",
                params.host, params.port, params.client_id
            ),
        );

        self.open_transport(&params.host, params.port, params.client_id)
            .await
    }

    async fn open_transport(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
    ) -> Result<(), GatewayError> {
        match self.inner.client.connect(host, port, client_id).await {
            Ok(rx) => {
                self.spawn_receive_loop(rx);
                tracing::info!(host, port, client_id, "broker transport opened");
                Ok(())
            }
            Err(e) => {
                self.inner.connection.lock().on_connect_failed();
                self.log(LogLevel::Error, format!("connect failed: {e}"));
                Err(e.into())
            }
        }
    }

    fn spawn_receive_loop(&self, mut rx: BrokerReceiver) {
        let gateway = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                metrics::record_callback(message.kind());
                message.dispatch(&gateway);
            }
            gateway.transport_ended();
        });

        if let Some(previous) = self.inner.receive_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Callback stream ended without a connection-closed callback.
    fn transport_ended(&self) {
        if self.inner.connection.lock().status {
            tracing::warn!("broker callback stream ended");
            self.connection_closed();
        }
    }

    /// Drop everything tied to the old session.
    pub(super) fn teardown(&self) {
        self.inner.client.disconnect();
        if let Some(task) = self.inner.receive_task.lock().take() {
            task.abort();
        }
        self.inner.history.fail_pending(GatewayError::TransportLost);
        self.inner.ticks.lock().clear();
    }
}

//! Subscription Worker
//!
//! Callers enqueue [`SubscribeRequest`]s; a single background task drains the
//! queue while the session is data-ready. Requests queued during an outage
//! wait for readiness instead of being dropped.
//!
//! The dedup map (`vt_symbol` → request) doubles as the re-subscription list:
//! after a handshake or a 1101 notice every tracked request is moved back onto
//! the queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::gateway::Gateway;
use crate::application::error::GatewayError;
use crate::application::events::LogLevel;
use crate::domain::market::{SubscribeRequest, TickData};
use crate::domain::symbol;
use crate::infrastructure::metrics;

/// Queue, dedup map, and worker guard.
pub(super) struct SubscriptionQueue {
    tx: mpsc::UnboundedSender<SubscribeRequest>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<SubscribeRequest>>>,
    subscribed: Mutex<HashMap<String, SubscribeRequest>>,
    worker_running: AtomicBool,
}

impl SubscriptionQueue {
    pub(super) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            subscribed: Mutex::new(HashMap::new()),
            worker_running: AtomicBool::new(false),
        }
    }

    fn enqueue(&self, req: SubscribeRequest) {
        // The receiver lives as long as the queue, so this cannot fail.
        let _ = self.tx.send(req);
    }

    /// Move every tracked request back onto the queue.
    pub(super) fn resubscribe_all(&self) -> usize {
        let tracked: Vec<SubscribeRequest> = {
            let mut subscribed = self.subscribed.lock();
            subscribed.drain().map(|(_, req)| req).collect()
        };
        let count = tracked.len();
        for req in tracked {
            self.enqueue(req);
        }
        metrics::set_active_subscriptions(0);
        count
    }

    pub(super) fn tracked(&self) -> Vec<String> {
        self.subscribed.lock().keys().cloned().collect()
    }

    pub(super) fn worker_running(&self) -> bool {
        self.worker_running.load(Ordering::SeqCst)
    }

    /// Claim the receiver for a new worker, unless one is alive.
    fn claim(&self) -> Option<mpsc::UnboundedReceiver<SubscribeRequest>> {
        if self
            .worker_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let rx = self.rx.lock().take();
        if rx.is_none() {
            self.worker_running.store(false, Ordering::SeqCst);
        }
        rx
    }

    /// Hand the receiver back when a worker exits.
    fn release(&self, rx: mpsc::UnboundedReceiver<SubscribeRequest>) {
        *self.rx.lock() = Some(rx);
        self.worker_running.store(false, Ordering::SeqCst);
    }
}

impl Gateway {
    /// Queue a market data subscription.
    ///
    /// Validation happens on the worker; rejections are reported as log
    /// events.
    pub fn subscribe(&self, req: SubscribeRequest) {
        tracing::debug!(vt_symbol = %req.vt_symbol(), "subscription queued");
        self.inner.subscriptions.enqueue(req);
    }

    /// Start the worker if none is alive.
    pub(super) fn start_subscription_worker(&self) {
        if let Some(rx) = self.inner.subscriptions.claim() {
            tracing::debug!("starting subscription worker");
            tokio::spawn(self.clone().run_subscription_worker(rx));
        }
    }

    async fn run_subscription_worker(self, mut rx: mpsc::UnboundedReceiver<SubscribeRequest>) {
        let poll = self.inner.options.subscription_poll_interval;
        let mut deferred: Option<SubscribeRequest> = None;

        loop {
            let (status, data_ready) = {
                let conn = self.inner.connection.lock();
                (conn.status, conn.data_ready)
            };
            if !status {
                break;
            }
            if !data_ready {
                tokio::time::sleep(poll).await;
                continue;
            }

            let req = match deferred.take() {
                Some(req) => req,
                None => match tokio::time::timeout(poll, rx.recv()).await {
                    Ok(Some(req)) => req,
                    Ok(None) => break,
                    Err(_) => continue,
                },
            };

            // Readiness can drop while we were parked on the queue.
            if !self.inner.connection.lock().data_ready {
                deferred = Some(req);
                continue;
            }

            if let Err(e) = self.process_subscription(&req) {
                metrics::record_subscription_rejected(e.code());
            }
        }

        if let Some(req) = deferred {
            self.inner.subscriptions.enqueue(req);
        }
        self.inner.subscriptions.release(rx);
        tracing::debug!("subscription worker stopped");

        // A handshake that raced our exit saw the old worker still claimed.
        if self.inner.connection.lock().status {
            self.start_subscription_worker();
        }
    }

    /// Validate, dedup, decode, then request contract details and quotes.
    fn process_subscription(&self, req: &SubscribeRequest) -> Result<(), GatewayError> {
        if req.exchange.ib_code().is_none() {
            let err = GatewayError::UnsupportedExchange(req.exchange);
            self.log(LogLevel::Warning, format!("subscribe {}: {err}", req.symbol));
            return Err(err);
        }

        let vt_symbol = req.vt_symbol();
        let contract = {
            let mut subscribed = self.inner.subscriptions.subscribed.lock();
            if subscribed.contains_key(&vt_symbol) {
                return Ok(());
            }
            let contract = match symbol::decode(&req.symbol, req.exchange) {
                Ok(contract) => contract,
                Err(e) => {
                    let err = GatewayError::from(e);
                    self.log(LogLevel::Warning, format!("subscribe: {err}"));
                    return Err(err);
                }
            };
            subscribed.insert(vt_symbol.clone(), req.clone());
            metrics::set_active_subscriptions(subscribed.len());
            contract
        };

        let details_id = self.next_req_id();
        if let Err(e) = self.inner.client.req_contract_details(details_id, &contract) {
            return Err(self.subscription_failed(&vt_symbol, None, e.into()));
        }

        // Tracked before the request goes out so the first quote finds it.
        let mkt_id = self.next_req_id();
        self.inner.ticks.lock().insert(
            mkt_id,
            TickData::new(
                self.gateway_name(),
                &req.symbol,
                req.exchange,
                self.inner.events.now(),
            ),
        );
        if let Err(e) = self.inner.client.req_mkt_data(mkt_id, &contract) {
            return Err(self.subscription_failed(&vt_symbol, Some(mkt_id), e.into()));
        }

        tracing::info!(%vt_symbol, req_id = mkt_id, "market data requested");
        Ok(())
    }

    /// Undo the tracking for a subscription whose request could not be sent,
    /// so a later subscribe for the same symbol is not taken for a duplicate.
    fn subscription_failed(
        &self,
        vt_symbol: &str,
        mkt_id: Option<i32>,
        err: GatewayError,
    ) -> GatewayError {
        if let Some(mkt_id) = mkt_id {
            self.inner.ticks.lock().remove(mkt_id);
        }
        {
            let mut subscribed = self.inner.subscriptions.subscribed.lock();
            subscribed.remove(vt_symbol);
            metrics::set_active_subscriptions(subscribed.len());
        }
        self.log(LogLevel::Error, format!("subscribe {vt_symbol}: {err}"));
        err
    }
}

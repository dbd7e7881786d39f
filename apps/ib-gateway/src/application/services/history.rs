//! Historical Query Bridge
//!
//! Turns the broker's `historical-bar* → historical-end` callback sequence
//! into one awaited call.
//!
//! The bridge is a single slot holding the in-flight request id, the bar
//! buffer, and a `oneshot` sender. The slot is filled before the request goes
//! out, so a reply that races the caller is never lost, and taking the sender
//! out of the slot makes "completed exactly once" structural: completion,
//! a matching error, and session teardown all race for the same `take()`.

use chrono::Utc;
use chrono_tz::Tz;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::oneshot;

use super::gateway::Gateway;
use crate::application::error::GatewayError;
use crate::application::events::LogLevel;
use crate::application::ports::{BrokerBar, HistoricalDataRequest};
use crate::domain::clock::{format_end_time, parse_broker_time};
use crate::domain::market::{BarData, HistoryRequest};
use crate::domain::symbol;
use crate::infrastructure::metrics;

/// Longest lookback the broker serves, in days.
pub const MAX_LOOKBACK_DAYS: i64 = 180;

type Reply = Result<Vec<BarData>, GatewayError>;

struct PendingQuery {
    req_id: i32,
    request: HistoryRequest,
    bars: Vec<BarData>,
    reply: oneshot::Sender<Reply>,
}

/// Single-flight slot.
pub(super) struct HistoryBridge {
    slot: Mutex<Option<PendingQuery>>,
}

impl HistoryBridge {
    pub(super) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Claim the slot for `req_id`.
    fn begin(
        &self,
        req_id: i32,
        request: HistoryRequest,
    ) -> Result<oneshot::Receiver<Reply>, GatewayError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(GatewayError::QueryInFlight);
        }
        let (reply, rx) = oneshot::channel();
        *slot = Some(PendingQuery {
            req_id,
            request,
            bars: Vec::new(),
            reply,
        });
        Ok(rx)
    }

    /// Release the slot without replying (the request never went out).
    fn abandon(&self, req_id: i32) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|pending| pending.req_id == req_id) {
            *slot = None;
        }
    }

    /// Buffer one bar. Returns false if `req_id` is not in flight.
    fn push_bar(&self, req_id: i32, bar: &BrokerBar, tz: Tz, gateway_name: &str) -> bool {
        let mut slot = self.slot.lock();
        let Some(pending) = slot.as_mut().filter(|pending| pending.req_id == req_id) else {
            return false;
        };

        let Some(datetime) = parse_broker_time(&bar.date, tz) else {
            tracing::warn!(req_id, date = %bar.date, "unparseable bar time, bar dropped");
            return true;
        };

        pending.bars.push(BarData {
            gateway_name: gateway_name.to_string(),
            symbol: pending.request.symbol.clone(),
            exchange: pending.request.exchange,
            datetime,
            interval: pending.request.interval,
            volume: bar.volume.max(Decimal::ZERO),
            open_price: bar.open,
            high_price: bar.high,
            low_price: bar.low,
            close_price: bar.close,
        });
        true
    }

    /// Resolve the query for `req_id`. Returns the bar count if it matched.
    fn complete(&self, req_id: i32) -> Option<usize> {
        let pending = self.take_matching(req_id)?;
        let count = pending.bars.len();
        let _ = pending.reply.send(Ok(pending.bars));
        Some(count)
    }

    /// Fail the query if `req_id` is the one in flight.
    pub(super) fn fail_matching(&self, req_id: i32, err: GatewayError) -> bool {
        match self.take_matching(req_id) {
            Some(pending) => {
                let _ = pending.reply.send(Err(err));
                true
            }
            None => false,
        }
    }

    /// Fail whatever is in flight.
    pub(super) fn fail_pending(&self, err: GatewayError) {
        if let Some(pending) = self.slot.lock().take() {
            tracing::warn!(req_id = pending.req_id, error = %err, "historical query aborted");
            let _ = pending.reply.send(Err(err));
        }
    }

    fn take_matching(&self, req_id: i32) -> Option<PendingQuery> {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|pending| pending.req_id == req_id) {
            slot.take()
        } else {
            None
        }
    }
}

impl Gateway {
    /// Query historical bars and wait for the complete result.
    ///
    /// Only one query may be in flight per gateway.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NotConnected`] without an open session.
    /// - [`GatewayError::UnsupportedInterval`], [`GatewayError::UnsupportedExchange`],
    ///   [`GatewayError::MalformedSymbol`] for unmappable requests.
    /// - [`GatewayError::QueryInFlight`] if another query is waiting.
    /// - [`GatewayError::HistoricalQueryFailed`] if the broker rejects it.
    /// - [`GatewayError::TransportLost`] if the session is torn down first.
    pub async fn query_history(&self, req: &HistoryRequest) -> Result<Vec<BarData>, GatewayError> {
        let result = self.run_history_query(req).await;
        match &result {
            Ok(bars) => {
                metrics::record_history_query("ok");
                tracing::info!(symbol = %req.symbol, bars = bars.len(), "historical query complete");
            }
            Err(e) => {
                metrics::record_history_query(e.code());
                self.log(
                    LogLevel::Warning,
                    format!("query_history {}: {e}", req.symbol),
                );
            }
        }
        result
    }

    async fn run_history_query(&self, req: &HistoryRequest) -> Result<Vec<BarData>, GatewayError> {
        if !self.inner.connection.lock().status {
            return Err(GatewayError::NotConnected);
        }
        let bar_size = req
            .interval
            .ib_bar_size()
            .ok_or(GatewayError::UnsupportedInterval(req.interval))?;
        let contract = symbol::decode(&req.symbol, req.exchange)?;

        let end = req.end.unwrap_or_else(|| {
            Utc::now()
                .with_timezone(&self.inner.options.reporting_tz)
                .fixed_offset()
        });
        let days = (end - req.start).num_days().clamp(1, MAX_LOOKBACK_DAYS);

        let request = HistoricalDataRequest {
            end_date_time: req.end.map(format_end_time).unwrap_or_default(),
            duration: format!("{days} D"),
            bar_size: bar_size.to_string(),
            what_to_show: if contract.sec_type.uses_midpoint_history() {
                "MIDPOINT"
            } else {
                "TRADES"
            }
            .to_string(),
            use_rth: false,
            format_date: 1,
        };

        let req_id = self.next_req_id();
        let reply = self.inner.history.begin(req_id, req.clone())?;

        if let Err(e) = self
            .inner
            .client
            .req_historical_data(req_id, &contract, &request)
        {
            self.inner.history.abandon(req_id);
            return Err(e.into());
        }
        tracing::debug!(req_id, duration = %request.duration, bar_size, "historical data requested");

        reply.await.unwrap_or(Err(GatewayError::TransportLost))
    }

    pub(super) fn on_historical_bar(&self, req_id: i32, bar: &BrokerBar) {
        let buffered = self.inner.history.push_bar(
            req_id,
            bar,
            self.inner.options.reporting_tz,
            self.gateway_name(),
        );
        if !buffered {
            tracing::debug!(req_id, "historical bar for no in-flight query");
        }
    }

    pub(super) fn on_historical_end(&self, req_id: i32) {
        match self.inner.history.complete(req_id) {
            Some(count) => tracing::debug!(req_id, count, "historical data end"),
            None => tracing::debug!(req_id, "historical end for no in-flight query"),
        }
    }
}

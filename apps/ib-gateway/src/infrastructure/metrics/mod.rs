//! Prometheus Metrics Module
//!
//! Counters and gauges for the gateway.
//!
//! # Metrics Categories
//!
//! - **Callbacks**: broker callbacks received, by kind
//! - **Market data**: tick snapshots emitted, active subscriptions
//! - **Orders**: submissions and rejections, by reason
//! - **Connection**: health-check reconnects
//! - **History**: historical queries, by outcome
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and describe every metric.
///
/// Later calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "ib_gateway_callbacks_total",
        "Broker callbacks received, by kind"
    );
    describe_counter!(
        "ib_gateway_ticks_emitted_total",
        "Tick snapshots published to the framework"
    );
    describe_gauge!(
        "ib_gateway_active_subscriptions",
        "Instruments tracked for market data"
    );
    describe_counter!(
        "ib_gateway_subscriptions_rejected_total",
        "Subscription requests dropped by the worker, by reason"
    );

    describe_counter!("ib_gateway_orders_submitted_total", "Orders placed");
    describe_counter!(
        "ib_gateway_orders_rejected_total",
        "Orders rejected before reaching the broker, by reason"
    );

    describe_counter!(
        "ib_gateway_reconnects_total",
        "Reconnects forced by the health check"
    );
    describe_counter!(
        "ib_gateway_history_queries_total",
        "Historical queries, by outcome"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one broker callback.
pub fn record_callback(kind: &'static str) {
    counter!("ib_gateway_callbacks_total", "kind" => kind).increment(1);
}

/// Record one tick snapshot published.
pub fn record_tick_emitted() {
    counter!("ib_gateway_ticks_emitted_total").increment(1);
}

/// Update the tracked-subscription gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(count: usize) {
    gauge!("ib_gateway_active_subscriptions").set(count as f64);
}

/// Record a subscription dropped by the worker.
pub fn record_subscription_rejected(reason: &'static str) {
    counter!("ib_gateway_subscriptions_rejected_total", "reason" => reason).increment(1);
}

/// Record an order placed with the broker.
pub fn record_order_submitted() {
    counter!("ib_gateway_orders_submitted_total").increment(1);
}

/// Record an order rejected locally.
pub fn record_order_rejected(reason: &'static str) {
    counter!("ib_gateway_orders_rejected_total", "reason" => reason).increment(1);
}

/// Record a health-check reconnect.
pub fn record_reconnect() {
    counter!("ib_gateway_reconnects_total").increment(1);
}

/// Record a finished historical query.
pub fn record_history_query(outcome: &'static str) {
    counter!("ib_gateway_history_queries_total", "outcome" => outcome).increment(1);
}

// =============================================================================
// Tests
// =============================================================================

//! Health Monitor
//!
//! Drives the gateway's connection health check from a timer. The check
//! fires once every N timer ticks; it is the only recovery path for a socket
//! that dies without a connection-closed callback.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::services::Gateway;
use crate::infrastructure::config::HealthSettings;

/// Counts timer ticks and reports when a check is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickCounter {
    every: u32,
    count: u32,
}

impl TickCounter {
    /// Counter that fires every `every` ticks (at least 1).
    #[must_use]
    pub const fn new(every: u32) -> Self {
        Self {
            every: if every == 0 { 1 } else { every },
            count: 0,
        }
    }

    /// Count one tick. Returns true when a check is due.
    pub const fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count < self.every {
            return false;
        }
        self.count = 0;
        true
    }
}

/// Timer task running [`Gateway::check_connection`].
///
/// # Example
///
/// ```rust,no_run
/// use ib_gateway::{Gateway, HealthMonitor, HealthSettings};
/// use tokio_util::sync::CancellationToken;
///
/// fn spawn_monitor(gateway: Gateway) -> CancellationToken {
///     let cancel = CancellationToken::new();
///     let monitor = HealthMonitor::new(HealthSettings::default(), gateway, cancel.clone());
///     tokio::spawn(monitor.run());
///     cancel
/// }
/// ```
pub struct HealthMonitor {
    period: Duration,
    counter: TickCounter,
    gateway: Gateway,
    cancel: CancellationToken,
}

impl HealthMonitor {
    /// Create a monitor for `gateway`.
    #[must_use]
    pub const fn new(settings: HealthSettings, gateway: Gateway, cancel: CancellationToken) -> Self {
        Self {
            period: settings.tick_period,
            counter: TickCounter::new(settings.check_every_ticks),
            gateway,
            cancel,
        }
    }

    /// Run until cancelled.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("health monitor cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if self.counter.tick() {
                        self.check().await;
                    }
                }
            }
        }
    }

    async fn check(&self) {
        if let Err(e) = self.gateway.check_connection().await {
            tracing::warn!(error = %e, "health check reconnect failed");
        }
    }
}

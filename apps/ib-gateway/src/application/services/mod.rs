//! Application Services
//!
//! The gateway session and the operations it exposes, one module per
//! concern. All of them extend the same [`Gateway`] handle.

mod callbacks;
mod connection;
mod gateway;
mod history;
mod orders;
mod subscription;

pub use connection::{
    CONNECTIVITY_LOST, CONNECTIVITY_RESTORED_DATA_KEPT, CONNECTIVITY_RESTORED_DATA_LOST,
    ConnectParams, ConnectionState, LifecyclePhase,
};
pub use gateway::{ConnectionSnapshot, DEFAULT_GATEWAY_NAME, Gateway, GatewayOptions};
pub use history::MAX_LOOKBACK_DAYS;
pub use orders::OrderTracker;

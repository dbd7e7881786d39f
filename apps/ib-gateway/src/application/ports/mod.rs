//! Port definitions.
//!
//! Interfaces the gateway depends on; infrastructure and tests provide the
//! implementations.

mod broker;
mod store;

pub use broker::{
    BrokerBar, BrokerCallbacks, BrokerClient, BrokerError, BrokerMessage, BrokerOrder,
    BrokerReceiver, ContractDetails, Execution, HistoricalDataRequest, PortfolioUpdate,
};
pub use store::{ContractStore, ContractTable, StoreError};

//! Contract Store Port (Driven Port)
//!
//! Persistence for the contract table, read once per connect and written
//! once per newly discovered contract.

use std::collections::HashMap;

use crate::domain::market::ContractData;

/// Contract table keyed by `vt_symbol`.
pub type ContractTable = HashMap<String, ContractData>;

/// Errors raised by a contract store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("contract store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored table could not be (de)serialized.
    #[error("contract store format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Load/save of the contract table.
pub trait ContractStore: Send + Sync {
    /// Load the whole table. A store that was never written loads empty.
    fn load(&self) -> Result<ContractTable, StoreError>;

    /// Replace the stored table.
    fn save(&self, contracts: &ContractTable) -> Result<(), StoreError>;
}

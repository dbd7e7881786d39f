//! Domain Layer - Broker-independent records and pure translation logic.
//!
//! Nothing here performs I/O or holds locks.

/// Broker timestamp parsing and request time formats.
pub mod clock;

/// Exchange, product, and option-type tables.
pub mod instrument;

/// Tick, bar, contract, account, and position records.
pub mod market;

/// Order and trade records with broker status mapping.
pub mod order;

/// Canonical symbol encode/decode.
pub mod symbol;

/// Tick aggregation and emission rule.
pub mod tick;

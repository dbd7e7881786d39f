//! Contract Store Adapters
//!
//! - [`JsonContractStore`]: the table as one JSON object on disk
//! - [`MemoryContractStore`]: in-process table for tests and embedding

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::application::ports::{ContractStore, ContractTable, StoreError};
use crate::domain::market::ContractData;

/// Contract table persisted as pretty-printed JSON keyed by `vt_symbol`.
#[derive(Debug, Clone)]
pub struct JsonContractStore {
    path: PathBuf,
}

impl JsonContractStore {
    /// Store backed by `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ContractStore for JsonContractStore {
    fn load(&self) -> Result<ContractTable, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ContractTable::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(ContractTable::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, contracts: &ContractTable) -> Result<(), StoreError> {
        // Sorted keys keep the file diffable.
        let sorted: BTreeMap<&String, &ContractData> = contracts.iter().collect();
        let json = serde_json::to_string_pretty(&sorted)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), count = contracts.len(), "contracts saved");
        Ok(())
    }
}

/// Contract table kept in memory.
#[derive(Debug, Default)]
pub struct MemoryContractStore {
    table: Mutex<ContractTable>,
    saves: Mutex<usize>,
}

impl MemoryContractStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `contracts`.
    #[must_use]
    pub fn with_contracts(contracts: impl IntoIterator<Item = ContractData>) -> Self {
        let table = contracts
            .into_iter()
            .map(|c| (c.vt_symbol(), c))
            .collect();
        Self {
            table: Mutex::new(table),
            saves: Mutex::new(0),
        }
    }

    /// Current table contents.
    #[must_use]
    pub fn snapshot(&self) -> ContractTable {
        self.table.lock().clone()
    }

    /// Number of saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl ContractStore for MemoryContractStore {
    fn load(&self) -> Result<ContractTable, StoreError> {
        Ok(self.table.lock().clone())
    }

    fn save(&self, contracts: &ContractTable) -> Result<(), StoreError> {
        self.table.lock().clone_from(contracts);
        *self.saves.lock() += 1;
        Ok(())
    }
}

//! In-memory store. Used by tests and by deployments that seed links at startup.

use std::sync::Mutex;

use super::{StoreError, TableBackend, Tables};

#[derive(Debug)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_tables(Tables::new())
    }

    pub fn from_tables(tables: Tables) -> Self {
        MemoryStore {
            tables: Mutex::new(tables),
        }
    }

    /// Returns a copy of the current tables.
    pub fn snapshot(&self) -> Result<Tables, StoreError> {
        self.read(Tables::clone)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBackend for MemoryStore {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&tables))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut tables)
    }
}

//! Durable JSON file store.
//!
//! The whole table set is rewritten on every mutation using the
//! write-to-temp-then-rename pattern:
//! 1. Write to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename to `<path>`
//! 4. fsync the parent directory
//!
//! The record volume (one row per mirrored issue) keeps this cheap enough.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

use super::tables::SCHEMA_VERSION;
use super::{StoreError, TableBackend, Tables};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = match try_load_tables(&path)? {
            Some(tables) => {
                info!(
                    path = %path.display(),
                    synced_issues = tables.synced_issues.len(),
                    "Loaded mapping store"
                );
                tables
            }
            None => {
                info!(path = %path.display(), "Starting with an empty mapping store");
                Tables::new()
            }
        };

        Ok(JsonFileStore {
            path,
            tables: Mutex::new(tables),
        })
    }
}

impl TableBackend for JsonFileStore {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&tables))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = tables.clone();
        let value = f(&mut next)?;
        off_worker(|| save_tables_atomic(&self.path, &next))?;
        *tables = next;
        debug!(path = %self.path.display(), "Persisted mapping store");
        Ok(value)
    }
}

/// Runs blocking disk I/O so it does not stall the other tasks on a
/// multi-threaded runtime's worker. Elsewhere `f` simply runs inline.
fn off_worker<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Saves the tables atomically to disk.
pub fn save_tables_atomic(path: &Path, tables: &Tables) -> Result<(), StoreError> {
    if let Some(parent) = parent_dir(path) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(tables)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = parent_dir(path) {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Loads the tables, returning `None` if the file does not exist.
pub fn try_load_tables(path: &Path) -> Result<Option<Tables>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let tables: Tables = serde_json::from_slice(&bytes)?;
    if tables.schema_version != SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: tables.schema_version,
        });
    }
    Ok(Some(tables))
}

/// `Path::parent` returns `Some("")` for bare file names.
fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Directory entries created by the rename are not durable until the
/// directory itself is synced.
fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

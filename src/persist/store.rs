//! Save Store
//!
//! Named-slot key/value storage for serialized snapshots.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Slot holds nothing.
    #[error("save slot {0} is empty")]
    Missing(String),

    /// Underlying storage failed.
    #[error("save store unavailable: {0}")]
    Io(#[from] io::Error),
}

/// Key/value storage for save slots.
pub trait SaveStore {
    /// Read a slot.
    fn get(&self, slot: &str) -> Result<String, StoreError>;

    /// Write a slot, replacing its contents.
    fn put(&mut self, slot: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw slot contents.
    pub fn raw(&self, slot: &str) -> Option<String> {
        self.slots.borrow().get(slot).cloned()
    }

    /// Overwrite a slot directly.
    pub fn insert_raw(&self, slot: &str, value: &str) {
        self.slots
            .borrow_mut()
            .insert(slot.to_string(), value.to_string());
    }
}

impl SaveStore for MemoryStore {
    fn get(&self, slot: &str) -> Result<String, StoreError> {
        self.raw(slot)
            .ok_or_else(|| StoreError::Missing(slot.to_string()))
    }

    fn put(&mut self, slot: &str, value: &str) -> Result<(), StoreError> {
        self.insert_raw(slot, value);
        Ok(())
    }
}

/// Directory-backed store: one `<slot>.json` file per slot.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the slots.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }
}

impl SaveStore for FileStore {
    fn get(&self, slot: &str) -> Result<String, StoreError> {
        match fs::read_to_string(self.path(slot)) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::Missing(slot.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, slot: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(slot);
        fs::write(&path, value)?;
        debug!(path = %path.display(), bytes = value.len(), "save slot written");
        Ok(())
    }
}

//! Persistence
//!
//! Save snapshots and the slot store they live in.
//!
//! - `snapshot`: capture, JSON encoding, version check, restore overrides
//! - `store`: named-slot storage (memory, directory)

pub mod snapshot;
pub mod store;

pub use snapshot::{PersistError, SaveSnapshot, SNAPSHOT_VERSION};
pub use store::{FileStore, MemoryStore, SaveStore, StoreError};

/// Slot used by save and load.
pub const SAVE_SLOT: &str = "savegame";

//! Durable key storage behind the manager.
//!
//! A backend stores armored key material by id (the key's 16-char
//! fingerprint) together with an optional JSON metadata sidecar. Every I/O
//! call receives a [`Deadline`] and fails with
//! [`Error::Timeout`](crate::Error::Timeout) once it has passed.
//!
//! # Implementations
//!
//! - [`MemoryBackend`]: in-process map, for tests and embedded use
//! - [`FileBackend`]: one file per key plus a `.json` sidecar
//! - `SqliteBackend`: SQLite table (feature `keystore`)

mod file;
mod memory;

#[cfg(feature = "keystore")]
mod schema;
#[cfg(feature = "keystore")]
mod sqlite;

pub use file::FileBackend;
pub use memory::MemoryBackend;

#[cfg(feature = "keystore")]
pub use sqlite::SqliteBackend;

use crate::error::Result;
use crate::types::Deadline;

/// Key material and metadata as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKey {
    /// Armored key text, base64-wrapped when the manager is configured so
    pub key_data: String,
    /// Raw JSON sidecar, if one was saved
    pub metadata: Option<String>,
}

/// Persistent key storage.
pub trait KeyBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Location description (directory, database file, ...).
    fn path(&self) -> String;

    /// Ids of every stored key.
    fn list(&self, deadline: Deadline) -> Result<Vec<String>>;

    /// Read one key. Missing ids fail with
    /// [`Error::KeyNotFound`](crate::Error::KeyNotFound).
    fn read(&self, id: &str, deadline: Deadline) -> Result<StoredKey>;

    /// Create or replace a key. `None` metadata removes any stored sidecar.
    fn save_with_metadata(
        &self,
        id: &str,
        key_data: &str,
        metadata: Option<&str>,
        deadline: Deadline,
    ) -> Result<()>;
}

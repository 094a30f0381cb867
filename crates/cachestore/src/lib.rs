//! # cachestore
//!
//! Persistence backends for cached values.
//!
//! ## Backends
//! - **Session**: process-wide in-memory store shared by name
//! - **Memory**: private in-memory store
//! - **File**: one framed record file per key inside a directory
//!
//! Backends only see framed bytes; encoding values is the caller's concern.

#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod record;

use std::sync::Arc;

pub use error::{Error, Result};
pub use file::FileBackend;
pub use memory::{session, MemoryBackend};
pub use record::{Record, HEADER_LEN, RECORD_MAGIC};

/// Key/value store of framed records
pub trait Backend: Send + Sync {
    /// Read the record stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Store `record` under `key`, replacing any previous record
    fn put(&self, key: &str, record: &Record) -> Result<()>;

    /// Remove the record stored under `key`; removing a missing key succeeds
    fn remove(&self, key: &str) -> Result<()>;
}

/// Resolve a backend by name.
///
/// `"session"` and `"sessionStorage"` select the process-wide [`session`]
/// store; `"memory"` creates a fresh private store.
pub fn named(name: &str) -> Result<Arc<dyn Backend>> {
    match name {
        "session" | "sessionStorage" => Ok(session()),
        "memory" => Ok(Arc::new(MemoryBackend::new())),
        other => Err(Error::UnknownBackend(other.to_string())),
    }
}

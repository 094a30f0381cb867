//! In-memory backends

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::Result;
use crate::record::Record;
use crate::Backend;

/// Process-wide store shared by every `session()` caller
static SESSION: Lazy<Arc<MemoryBackend>> = Lazy::new(|| Arc::new(MemoryBackend::new()));

/// Backend keeping encoded records in a hash map
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>, RandomState>>,
}

impl MemoryBackend {
    /// Create an empty, private store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every stored record
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Record>> {
        match self.entries.read().get(key) {
            Some(bytes) => Record::decode(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, record: &Record) -> Result<()> {
        let bytes = record.encode()?;
        self.entries.write().insert(key.to_string(), bytes);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// The process-wide session store.
///
/// Lives as long as the process; every caller sees the same records.
pub fn session() -> Arc<MemoryBackend> {
    Arc::clone(&SESSION)
}

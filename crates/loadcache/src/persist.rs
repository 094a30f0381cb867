//! Value persistence on top of cachestore backends

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use cachestore::{Backend, FileBackend, Record};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cached::Cached;
use crate::error::PersistError;

/// Reads and writes one cached value per key
pub trait PersistenceManager<T>: Send + Sync {
    /// Read the value stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<Cached<T>>, PersistError>;

    /// Store `value` under `key`
    fn store(&self, key: &str, value: &Cached<T>) -> Result<(), PersistError>;

    /// Forget the value stored under `key`
    fn remove(&self, key: &str) -> Result<(), PersistError>;
}

/// Persistence encoding values as JSON records
pub struct JsonPersistence<T> {
    backend: Arc<dyn Backend>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonPersistence<T> {
    /// Persist through an existing backend
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    /// Persist through a backend selected by name (see [`cachestore::named`])
    pub fn named(name: &str) -> cachestore::Result<Self> {
        Ok(Self::new(cachestore::named(name)?))
    }

    /// Persist as record files inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> cachestore::Result<Self> {
        Ok(Self::new(Arc::new(FileBackend::open(dir)?)))
    }
}

impl<T> PersistenceManager<T> for JsonPersistence<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self, key: &str) -> Result<Option<Cached<T>>, PersistError> {
        let Some(record) = self.backend.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&record.payload)?;
        Ok(Some(Cached::restored(value, record.stored_at())))
    }

    fn store(&self, key: &str, value: &Cached<T>) -> Result<(), PersistError> {
        let payload = serde_json::to_vec(value.value())?;
        self.backend
            .put(key, &Record::stamped(value.loaded_at(), payload))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.backend.remove(key)?;
        Ok(())
    }
}

//! Bridge configuration

use std::sync::Arc;
use std::time::Duration;

use loadcache::{BoxError, Cached, JsonPersistence, PersistenceManager};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::flush::{FlushFn, DEFAULT_EXPIRY_PROBE_WINDOW};
use crate::signal::FlushSignal;

/// Options for a [`CacheBridge`](crate::CacheBridge).
///
/// Without a flush policy every subscription emits once and completes.
/// With one, subscriptions stay open and re-emit after each flush.
pub struct BridgeConfig<T> {
    pub(crate) flush_on: Option<FlushFn<T>>,
    pub(crate) persistence: Option<Arc<dyn PersistenceManager<T>>>,
    pub(crate) persistence_key: Option<String>,
    pub(crate) expiry_probe_window: Duration,
}

impl<T> Default for BridgeConfig<T> {
    fn default() -> Self {
        Self {
            flush_on: None,
            persistence: None,
            persistence_key: None,
            expiry_probe_window: DEFAULT_EXPIRY_PROBE_WINDOW,
        }
    }
}

impl<T> BridgeConfig<T> {
    /// Configuration with no flush policy and no persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Map each freshly cached value to the signal marking it stale.
    ///
    /// A signal that fires right away also rejects persisted values on read.
    pub fn flush_on<F>(mut self, flush_on: F) -> Self
    where
        F: Fn(&Cached<T>) -> std::result::Result<FlushSignal, BoxError> + Send + Sync + 'static,
    {
        self.flush_on = Some(Arc::new(flush_on));
        self
    }

    /// Persist values through an engine-native manager.
    ///
    /// When a persisted value is available the source may never be subscribed.
    pub fn persistence(mut self, manager: Arc<dyn PersistenceManager<T>>) -> Self {
        self.persistence = Some(manager);
        self
    }

    /// Persist values as JSON in a backend selected by name
    /// (`"session"`, `"sessionStorage"` or `"memory"`)
    pub fn persistence_named(self, name: &str) -> Result<Self>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let manager = JsonPersistence::<T>::named(name)?;
        Ok(self.persistence(Arc::new(manager)))
    }

    /// Key the persisted value is stored under
    pub fn persistence_key(mut self, key: impl Into<String>) -> Self {
        self.persistence_key = Some(key.into());
        self
    }

    /// How long a persisted value's flush signal may take to fire before the
    /// value is accepted. Longer windows catch slower signals but delay reads.
    pub fn expiry_probe_window(mut self, window: Duration) -> Self {
        self.expiry_probe_window = window;
        self
    }

    /// Whether a flush policy is configured
    pub fn has_flush_policy(&self) -> bool {
        self.flush_on.is_some()
    }
}

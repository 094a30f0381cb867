//! Error types for loadcache

use std::sync::Arc;

use thiserror::Error;

/// Boxed error accepted from loaders and flush policies
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single load.
///
/// Cloneable so one failed shared load can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The loader reported an error
    #[error("source failed: {0}")]
    Source(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// The loader finished without producing a value
    #[error("source completed without producing a value")]
    Empty,

    /// The cache was dropped while the load was in flight
    #[error("cache dropped while loading")]
    Dropped,
}

impl LoadError {
    /// Wrap any error reported by a loader
    pub fn from_source<E: Into<BoxError>>(err: E) -> Self {
        LoadError::Source(Arc::from(err.into()))
    }
}

/// Failure to read, write or remove a persisted value
#[derive(Debug, Error)]
pub enum PersistError {
    /// Backend failure
    #[error("store error: {0}")]
    Store(#[from] cachestore::Error),

    /// Value could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

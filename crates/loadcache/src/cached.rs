//! Cached values and their metadata

use std::time::{Duration, SystemTime};

/// Where a cached value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Produced by the loader
    Loader,
    /// Read back from a persistence backend
    Persistence,
}

/// A value held by the cache together with engine-managed metadata
#[derive(Debug, Clone)]
pub struct Cached<T> {
    value: T,
    loaded_at: SystemTime,
    origin: Origin,
}

impl<T> Cached<T> {
    /// Wrap a freshly loaded value
    pub fn loaded(value: T) -> Self {
        Self {
            value,
            loaded_at: SystemTime::now(),
            origin: Origin::Loader,
        }
    }

    /// Wrap a value read back from persistence, stamped with its store time
    pub fn restored(value: T, loaded_at: SystemTime) -> Self {
        Self {
            value,
            loaded_at,
            origin: Origin::Persistence,
        }
    }

    /// The cached payload
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consume the wrapper, returning the payload
    pub fn into_value(self) -> T {
        self.value
    }

    /// When the value was produced by the loader
    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    /// Where the value came from
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Time elapsed since the value was loaded (zero if the clock went back)
    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed().unwrap_or_default()
    }
}

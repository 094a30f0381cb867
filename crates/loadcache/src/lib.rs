//! # loadcache
//!
//! Single-flight cache for one expensive value.
//!
//! ## Architecture
//! - **Loader**: produces the value; invoked at most once per need
//! - **AutoFlush**: optional policy deciding when the value goes stale
//! - **Persistence**: optional JSON copy of the value in a `cachestore` backend
//! - **Listeners**: scoped after-flush notifications, in registration order

#![warn(missing_docs)]

mod cache;
mod cached;
mod error;
mod listeners;
mod persist;
mod stats;
mod traits;

pub use cache::{LoadCache, LoadCacheBuilder};
pub use cached::{Cached, Origin};
pub use error::{BoxError, LoadError, PersistError};
pub use listeners::FlushListener;
pub use persist::{JsonPersistence, PersistenceManager};
pub use stats::CacheStats;
pub use traits::{AutoFlush, Invalidate, Loader};

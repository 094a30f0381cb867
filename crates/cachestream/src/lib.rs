//! # cachestream
//!
//! Cached value streams over one-shot sources.
//!
//! ## Architecture
//! - **Source**: cold stream whose first item is the value to cache
//! - **CacheBridge**: hands every subscriber the cached value, loading it once
//! - **Flush policy**: maps a cached value to a signal marking it stale
//! - **FlushAdapter**: drives the cache's auto-flush hooks from that signal
//!
//! ```no_run
//! use cachestream::{signal, BridgeConfig, SourceExt};
//! use futures::{stream, StreamExt};
//! use std::time::Duration;
//!
//! # async fn demo() -> cachestream::Result<()> {
//! let source = || stream::iter([Ok::<_, cachestream::BoxError>("Hello World".to_string())]);
//! let bridge = source.cached(
//!     BridgeConfig::new().flush_on(|_| Ok(signal::after(Duration::from_secs(60)))),
//! )?;
//!
//! let mut values = bridge.subscribe();
//! while let Some(value) = values.next().await {
//!     println!("{:?}", value);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod bridge;
mod config;
mod error;
mod flush;
pub mod signal;
mod source;

pub use bridge::{cache_bridge, CacheBridge, SourceExt, Subscription};
pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use flush::{FlushAdapter, FlushFn, DEFAULT_EXPIRY_PROBE_WINDOW};
pub use signal::FlushSignal;
pub use source::{from_future, Source};

pub use loadcache::{
    BoxError, CacheStats, Cached, JsonPersistence, LoadError, Origin, PersistenceManager,
};

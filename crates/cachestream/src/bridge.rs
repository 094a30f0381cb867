//! CacheBridge: a cached, optionally self-refreshing stream over a cold source

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use loadcache::{CacheStats, Cached, LoadCache, LoadError};
use tracing::debug;

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::flush::FlushAdapter;
use crate::source::{first_value, Source};

/// Stream of values handed out by a [`CacheBridge`].
///
/// Dropping it stops any refreshing done on its behalf.
pub struct Subscription<T> {
    inner: BoxStream<'static, std::result::Result<T, LoadError>>,
}

impl<T> Subscription<T> {
    fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<T, LoadError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = std::result::Result<T, LoadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Turns a cold source into a cached stream.
///
/// Every subscription gets the current cached value, loading it through the
/// source only when needed. Without a flush policy the subscription then
/// completes; with one it stays open and receives the reloaded value after
/// every flush.
///
/// Clones share the same cache.
pub struct CacheBridge<T> {
    cache: LoadCache<T>,

    /// Fixed at construction: true when no flush policy was given
    close_after_emit: bool,
}

impl<T> Clone for CacheBridge<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            close_after_emit: self.close_after_emit,
        }
    }
}

impl<T> CacheBridge<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap `source` according to `config`.
    ///
    /// The source is not subscribed until the first subscription needs a value.
    pub fn new<S>(source: S, config: BridgeConfig<T>) -> Result<Self>
    where
        S: Source<T>,
    {
        let BridgeConfig {
            flush_on,
            persistence,
            persistence_key,
            expiry_probe_window,
        } = config;
        let close_after_emit = flush_on.is_none();

        let mut builder = LoadCache::builder(move || first_value(source.subscribe()));
        if let Some(flush_on) = flush_on {
            builder = builder.auto_flush(Arc::new(FlushAdapter::from_shared(
                flush_on,
                expiry_probe_window,
            )));
        }
        match (persistence, persistence_key) {
            (Some(manager), Some(key)) => builder = builder.persistence(manager, key),
            (Some(_), None) => return Err(Error::MissingPersistenceKey),
            (None, Some(key)) => debug!(%key, "Persistence key given without persistence; ignored"),
            (None, None) => {}
        }

        Ok(Self {
            cache: builder.build(),
            close_after_emit,
        })
    }

    /// Subscribe to the cached value
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription::new(
            self.subscribe_cached()
                .map(|item| item.map(Cached::into_value)),
        )
    }

    /// Subscribe to the cached value together with its metadata
    pub fn subscribe_cached(&self) -> Subscription<Cached<T>> {
        let cache = self.cache.clone();

        if self.close_after_emit {
            return Subscription::new(stream::once(async move { cache.get().await }));
        }

        // Registered up front so flushes racing the first load are not lost.
        let listener = cache.on_flush();
        Subscription::new(async_stream::stream! {
            loop {
                match cache.get().await {
                    Ok(cached) => yield Ok(cached),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
                listener.notified().await;
            }
        })
    }

    /// Invalidate the cached value; open subscriptions receive the reload
    pub fn flush(&self) {
        self.cache.flush();
    }

    /// Whether subscriptions complete after their first value
    pub fn closes_after_emit(&self) -> bool {
        self.close_after_emit
    }

    /// Number of open refreshing subscriptions
    pub fn listener_count(&self) -> usize {
        self.cache.listener_count()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        self.cache.stats()
    }
}

/// Build a [`CacheBridge`] from a source and a configuration
pub fn cache_bridge<T, S>(source: S, config: BridgeConfig<T>) -> Result<CacheBridge<T>>
where
    T: Clone + Send + Sync + 'static,
    S: Source<T>,
{
    CacheBridge::new(source, config)
}

/// Adds [`cached`](SourceExt::cached) to every [`Source`]
pub trait SourceExt<T>: Source<T> + Sized {
    /// Wrap this source in a [`CacheBridge`]
    fn cached(self, config: BridgeConfig<T>) -> Result<CacheBridge<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        CacheBridge::new(self, config)
    }
}

impl<T, S: Source<T>> SourceExt<T> for S {}

//! Capabilities plugged into the cache: loading and automatic flushing

use std::future::Future;

use async_trait::async_trait;

use crate::cached::Cached;
use crate::error::LoadError;

/// Callback handed to [`AutoFlush::fetched`]; invalidates the value it was armed for
pub type Invalidate = Box<dyn FnOnce() + Send + 'static>;

/// Produces the value to cache
#[async_trait]
pub trait Loader<T>: Send + Sync {
    /// Load a fresh value
    async fn load(&self) -> Result<T, LoadError>;
}

#[async_trait]
impl<T, F, Fut> Loader<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, LoadError>> + Send,
{
    async fn load(&self) -> Result<T, LoadError> {
        (self)().await
    }
}

/// Decides when a cached value goes stale.
///
/// The cache calls [`is_expired`](AutoFlush::is_expired) on values read back
/// from persistence, [`fetched`](AutoFlush::fetched) after every committed
/// value and [`flushed`](AutoFlush::flushed) after every invalidation.
#[async_trait]
pub trait AutoFlush<T>: Send + Sync {
    /// Whether a value is already stale; must not fail
    async fn is_expired(&self, value: &Cached<T>) -> bool;

    /// Arm invalidation for a freshly committed value
    fn fetched(&self, value: &Cached<T>, on_invalidate: Invalidate);

    /// The current value was invalidated; drop anything armed for it
    fn flushed(&self);
}

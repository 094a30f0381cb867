//! Cold sources wrapped by a bridge

use std::future::Future;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use loadcache::{BoxError, LoadError};

/// A cold source: every subscription starts a fresh stream.
///
/// Only the first item of each subscription is used.
pub trait Source<T>: Send + Sync + 'static {
    /// Start a new subscription
    fn subscribe(&self) -> BoxStream<'static, Result<T, BoxError>>;
}

impl<T, F, S, E> Source<T> for F
where
    T: 'static,
    F: Fn() -> S + Send + Sync + 'static,
    S: Stream<Item = Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn subscribe(&self) -> BoxStream<'static, Result<T, BoxError>> {
        (self)().map(|item| item.map_err(Into::into)).boxed()
    }
}

/// A source producing one value per subscription from an async function
pub fn from_future<T, F, Fut, E>(f: F) -> impl Source<T>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
{
    move || stream::once(f())
}

/// Subscribe and take the first item; ending without one is a failure
pub(crate) async fn first_value<T>(
    mut subscription: BoxStream<'static, Result<T, BoxError>>,
) -> Result<T, LoadError> {
    match subscription.next().await {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(LoadError::from_source(e)),
        None => Err(LoadError::Empty),
    }
}

//! Ready-made flush signals.
//!
//! A flush signal is a stream whose first item marks the cached value stale.
//! An `Err` item means the signal broke; the value then stops refreshing
//! automatically.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use loadcache::BoxError;
use tokio::sync::{broadcast, Notify};

/// Stream whose first item marks a cached value stale
pub type FlushSignal = BoxStream<'static, Result<(), BoxError>>;

/// A signal that never fires
pub fn never() -> FlushSignal {
    stream::pending().boxed()
}

/// A signal that fires as soon as it is polled and then stays open
pub fn immediate() -> FlushSignal {
    stream::once(future::ready(Ok(())))
        .chain(stream::pending())
        .boxed()
}

/// A signal that fires once `delay` has elapsed
pub fn after(delay: Duration) -> FlushSignal {
    stream::once(async move {
        tokio::time::sleep(delay).await;
        Ok::<(), BoxError>(())
    })
    .chain(stream::pending())
    .boxed()
}

/// A signal firing every `period`, starting one period from now
pub fn every(period: Duration) -> FlushSignal {
    let start = tokio::time::Instant::now() + period;
    stream::unfold(tokio::time::interval_at(start, period), |mut ticks| async move {
        ticks.tick().await;
        Some((Ok::<(), BoxError>(()), ticks))
    })
    .boxed()
}

/// A signal that fails straight away
pub fn failed<E: Into<BoxError>>(err: E) -> FlushSignal {
    stream::once(future::ready(Err(err.into()))).boxed()
}

/// A signal firing on every message sent after subscription.
///
/// Lagging counts as a message; the channel closing ends the signal.
pub fn from_broadcast<M>(rx: broadcast::Receiver<M>) -> FlushSignal
where
    M: Clone + Send + 'static,
{
    stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                Some((Ok::<(), BoxError>(()), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    })
    .boxed()
}

/// A signal firing whenever `notify` hands out a permit
pub fn from_notify(notify: Arc<Notify>) -> FlushSignal {
    stream::unfold(notify, |notify| async move {
        notify.notified().await;
        Some((Ok::<(), BoxError>(()), notify))
    })
    .boxed()
}

/// Adapt any stream; every `Ok` item counts as a firing
pub fn from_stream<S, M, E>(source: S) -> FlushSignal
where
    S: Stream<Item = Result<M, E>> + Send + 'static,
    E: Into<BoxError>,
{
    source
        .map(|item| item.map(|_| ()).map_err(Into::into))
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_never_stays_silent() {
        assert!(timeout(SHORT, never().next()).await.is_err());
    }

    #[tokio::test]
    async fn test_immediate_fires_then_stays_open() {
        let mut signal = immediate();
        assert!(matches!(signal.next().await, Some(Ok(()))));
        assert!(timeout(SHORT, signal.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_after_fires_late() {
        let mut signal = after(Duration::from_millis(30));
        assert!(timeout(Duration::from_millis(5), signal.next()).await.is_err());
        assert!(matches!(signal.next().await, Some(Ok(()))));
    }

    #[tokio::test]
    async fn test_every_fires_repeatedly() {
        let mut signal = every(Duration::from_millis(10));
        assert!(timeout(Duration::from_millis(2), signal.next()).await.is_err());
        assert!(matches!(signal.next().await, Some(Ok(()))));
        assert!(matches!(signal.next().await, Some(Ok(()))));
    }

    #[tokio::test]
    async fn test_failed_reports_error() {
        let mut signal = failed("no upstream");
        let err = signal.next().await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "no upstream");
    }

    #[tokio::test]
    async fn test_broadcast_fires_per_message_and_ends_on_close() {
        let (tx, rx) = broadcast::channel::<u32>(4);
        let mut signal = from_broadcast(rx);

        tx.send(1).unwrap();
        assert!(matches!(signal.next().await, Some(Ok(()))));

        drop(tx);
        assert!(signal.next().await.is_none());
    }

    #[tokio::test]
    async fn test_notify_fires_on_permit() {
        let notify = Arc::new(Notify::new());
        let mut signal = from_notify(notify.clone());

        notify.notify_one();
        assert!(matches!(signal.next().await, Some(Ok(()))));
    }

    #[tokio::test]
    async fn test_from_stream_maps_items() {
        let mut signal = from_stream(stream::iter([Ok::<_, BoxError>("tick"), Err("bad".into())]));
        assert!(matches!(signal.next().await, Some(Ok(()))));
        assert!(matches!(signal.next().await, Some(Err(_))));
    }
}

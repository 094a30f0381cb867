//! Flush signal adapter.
//!
//! Turns a declarative flush policy (`value -> signal`) into the imperative
//! [`AutoFlush`] protocol the cache expects:
//!
//! - `is_expired` probes the signal for a short window
//! - `fetched` watches the signal and invalidates on its first item
//! - `flushed` drops the current watch
//!
//! Failures of the policy or the signal never reach the cache; they are
//! logged and the value simply stops refreshing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use loadcache::{AutoFlush, BoxError, Cached, Invalidate};
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, error, warn};

use crate::signal::FlushSignal;

/// Flush policy: maps a freshly cached value to the signal marking it stale
pub type FlushFn<T> = Arc<dyn Fn(&Cached<T>) -> Result<FlushSignal, BoxError> + Send + Sync>;

/// Default window `is_expired` waits for the signal to fire
pub const DEFAULT_EXPIRY_PROBE_WINDOW: Duration = Duration::from_millis(10);

/// Running watch on a flush signal; aborted when dropped
struct Watch {
    task: AbortHandle,
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// [`AutoFlush`] implementation driven by flush signals
pub struct FlushAdapter<T> {
    flush_on: FlushFn<T>,

    /// How long `is_expired` waits for the signal. Signals that fire later
    /// than this are reported as not expired.
    probe_window: Duration,

    /// At most one live watch
    current: Mutex<Option<Watch>>,
}

impl<T> FlushAdapter<T> {
    /// Create an adapter around `flush_on`
    pub fn new<F>(flush_on: F, probe_window: Duration) -> Self
    where
        F: Fn(&Cached<T>) -> Result<FlushSignal, BoxError> + Send + Sync + 'static,
    {
        Self::from_shared(Arc::new(flush_on), probe_window)
    }

    pub(crate) fn from_shared(flush_on: FlushFn<T>, probe_window: Duration) -> Self {
        Self {
            flush_on,
            probe_window,
            current: Mutex::new(None),
        }
    }

    /// Whether the stored watch is still waiting for its signal.
    ///
    /// Reflects the stored watch only; a watch replaced or cleared since is
    /// not considered.
    pub fn has_watch(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|watch| !watch.task.is_finished())
    }

    fn invoke(&self, value: &Cached<T>) -> Option<FlushSignal> {
        match (self.flush_on)(value) {
            Ok(signal) => Some(signal),
            Err(e) => {
                error!(error = %e, "Unable to invoke flush policy");
                None
            }
        }
    }

    /// Swap in `next` and dispose of the previous watch
    fn replace_watch(&self, next: Option<Watch>) {
        let previous = std::mem::replace(&mut *self.current.lock(), next);
        drop(previous);
    }
}

#[async_trait]
impl<T> AutoFlush<T> for FlushAdapter<T>
where
    T: Send + Sync + 'static,
{
    async fn is_expired(&self, value: &Cached<T>) -> bool {
        let Some(mut signal) = self.invoke(value) else {
            return false;
        };

        match tokio::time::timeout(self.probe_window, signal.next()).await {
            Ok(Some(Ok(()))) => true,
            Ok(Some(Err(e))) => {
                error!(
                    error = %e,
                    "Flush signal failed while checking expiration; assuming value has not expired"
                );
                false
            }
            Ok(None) => {
                warn!(
                    "Flush signal ended without firing while checking expiration; \
                     assuming value has not expired"
                );
                false
            }
            Err(_) => false,
        }
    }

    fn fetched(&self, value: &Cached<T>, on_invalidate: Invalidate) {
        self.replace_watch(None);

        let Some(mut signal) = self.invoke(value) else {
            return;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "No runtime to watch the flush signal on");
                return;
            }
        };

        // Slot stays locked until the watch is stored; a signal firing right
        // away re-enters `flushed` and `fetched` from the watch task.
        let mut current = self.current.lock();
        let task = runtime.spawn(async move {
            match signal.next().await {
                Some(Ok(())) => {
                    debug!("Flush signal fired");
                    on_invalidate();
                }
                Some(Err(e)) => {
                    error!(error = %e, "Flush signal failed; flushing won't trigger anymore");
                }
                None => {
                    warn!("Flush signal ended without firing; flushing won't trigger anymore");
                }
            }
        });
        *current = Some(Watch {
            task: task.abort_handle(),
        });
    }

    fn flushed(&self) {
        self.replace_watch(None);
    }
}

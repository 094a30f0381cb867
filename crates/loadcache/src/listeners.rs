//! After-flush listener registry

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Registered listeners keyed by registration order
#[derive(Debug, Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, Arc<Notify>>>,
}

impl Listeners {
    pub(crate) fn register(self: &Arc<Self>) -> FlushListener {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notify = Arc::new(Notify::new());
        self.entries.lock().insert(id, Arc::clone(&notify));

        FlushListener {
            id,
            notify,
            registry: Arc::downgrade(self),
        }
    }

    /// Wake every listener in registration order
    pub(crate) fn notify_all(&self) {
        let targets: Vec<Arc<Notify>> = self.entries.lock().values().cloned().collect();
        for notify in targets {
            // A listener that is busy keeps one permit, so bursts coalesce.
            notify.notify_one();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Registration of interest in invalidations.
///
/// Deregisters itself when dropped.
#[derive(Debug)]
pub struct FlushListener {
    id: u64,
    notify: Arc<Notify>,
    registry: Weak<Listeners>,
}

impl FlushListener {
    /// Wait for the next invalidation.
    ///
    /// Completes immediately if an invalidation happened since the last call.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Registration id; lower ids are notified first
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for FlushListener {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.entries.lock().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_notify_reaches_listener() {
        let listeners = Arc::new(Listeners::default());
        let listener = listeners.register();

        listeners.notify_all();
        tokio::time::timeout(Duration::from_secs(1), listener.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bursts_coalesce() {
        let listeners = Arc::new(Listeners::default());
        let listener = listeners.register();

        listeners.notify_all();
        listeners.notify_all();
        listener.notified().await;

        let second = tokio::time::timeout(Duration::from_millis(20), listener.notified()).await;
        assert!(second.is_err());
    }

    #[test]
    fn test_drop_deregisters() {
        let listeners = Arc::new(Listeners::default());
        let first = listeners.register();
        let second = listeners.register();
        assert_eq!(listeners.len(), 2);
        assert!(first.id() < second.id());

        drop(first);
        assert_eq!(listeners.len(), 1);
        drop(second);
        assert_eq!(listeners.len(), 0);
    }
}

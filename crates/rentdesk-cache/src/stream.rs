// ── Reactive slot streams ──
//
// Subscription to one slot's value. Fires on successful refreshes and `set`,
// never on invalidation.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Value carried by a slot subscription. `None` until first populated.
pub type Snapshot<T> = Option<Arc<T>>;

/// A subscription to a single cache slot.
pub struct SlotStream<T: Send + Sync + 'static> {
    current: Snapshot<T>,
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> SlotStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at subscription time or at the last `changed()`.
    pub fn current(&self) -> Option<&Arc<T>> {
        self.current.as_ref()
    }

    /// Most recently published value.
    pub fn latest(&self) -> Snapshot<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published value.
    /// Returns `None` once the cache has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        loop {
            self.receiver.changed().await.ok()?;
            let snap = self.receiver.borrow_and_update().clone();
            self.current.clone_from(&snap);
            if let Some(value) = snap {
                return Some(value);
            }
        }
    }

    pub fn into_stream(self) -> SlotWatchStream<T> {
        SlotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding the current value first, then every update.
pub struct SlotWatchStream<T: Send + Sync + 'static> {
    inner: WatchStream<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> Stream for SlotWatchStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ── Reactive board stream ──
//
// Subscription type for consuming board snapshots from the store.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Board;

/// A subscription to a board's snapshots.
///
/// Provides both point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`. `None`
/// means the board has not been loaded yet.
pub struct BoardStream {
    current: Option<Arc<Board>>,
    receiver: watch::Receiver<Option<Arc<Board>>>,
}

impl BoardStream {
    pub(crate) fn new(receiver: watch::Receiver<Option<Arc<Board>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> Option<&Arc<Board>> {
        self.current.as_ref()
    }

    /// The latest snapshot, which may be newer than `current()`.
    pub fn latest(&self) -> Option<Arc<Board>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<Option<Arc<Board>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current.clone_from(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` of loaded boards, skipping the unloaded state.
    pub fn into_stream(self) -> BoardWatchStream {
        BoardWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by the store's `watch` channel.
pub struct BoardWatchStream {
    inner: WatchStream<Option<Arc<Board>>>,
}

impl Stream for BoardWatchStream {
    type Item = Arc<Board>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Some(board))) => return Poll::Ready(Some(board)),
                Poll::Ready(Some(None)) => {}
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

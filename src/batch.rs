use crate::buffer::{BatchJoin, BufferSlot, DEFAULT_DELAY};
use crate::builder::BatchBuilder;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::loader::{BatchFetch, Loader};
use crate::retain::Retain;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

/// Batches single item requests together, without remembering anything it loaded.
///
/// Each [`Loader::include`] joins the buffer active in this loader's [`BufferSlot`] (opening one if
/// needed) and picks its own item out of the batch result once the window is dispatched.
pub struct BatchUncached<F, V> {
    fetch: Arc<F>,
    slot: Arc<BufferSlot<V>>,
    delay: Duration,
}

/// A [`BatchUncached`] with its results retained per identity
pub type Batch<F, V> = Retain<BatchUncached<F, V>, V>;

impl<F, V> BatchUncached<F, V>
where
    F: BatchFetch<V>,
    V: Clone + Send + Sync + 'static,
{
    /// A loader with its own buffer slot and the default delay
    pub fn new(fetch: F) -> Self {
        Self::from_parts(fetch, Arc::new(BufferSlot::new()), DEFAULT_DELAY)
    }

    pub fn builder(fetch: F) -> BatchBuilder<F, V> {
        BatchBuilder::new(fetch)
    }

    pub fn from_parts(fetch: F, slot: Arc<BufferSlot<V>>, delay: Duration) -> Self {
        BatchUncached {
            fetch: Arc::new(fetch),
            slot,
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn slot(&self) -> &Arc<BufferSlot<V>> {
        &self.slot
    }

    /// Join the current batch window for `id`.
    ///
    /// The identity is pushed immediately, not when the returned future is first polled.
    pub fn join(&self, id: Identity) -> BatchInclude<V> {
        BatchInclude {
            join: self.slot.join(id.clone(), &self.fetch, self.delay),
            id: Some(id),
        }
    }
}

impl<F, V> Loader<V> for BatchUncached<F, V>
where
    F: BatchFetch<V>,
    V: Clone + Send + Sync + 'static,
{
    fn include(&self, id: Identity) -> impl Future<Output = Result<V>> + Send {
        self.join(id)
    }
}

/// Resolves to one item of a coalesced batch, see [`BatchUncached::join`]
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[pin_project::pin_project]
pub struct BatchInclude<V> {
    #[pin]
    join: BatchJoin<V>,
    id: Option<Identity>,
}

impl<V: Clone> Future for BatchInclude<V> {
    type Output = Result<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let items = ready!(this.join.poll(cx));
        let id = this.id.take().expect("BatchInclude polled after completion");

        // a missing identity only fails this join, the rest of the batch is unaffected
        Poll::Ready(items.and_then(|items| match items.get(&id) {
            Some(item) => Ok(item.clone()),
            None => {
                tracing::warn!(%id, "item missing from batch result");
                Err(Error::NotFound(id))
            }
        }))
    }
}

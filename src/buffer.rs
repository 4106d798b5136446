use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::loader::BatchFetch;

use futures::future::{BoxFuture, FutureExt, Shared};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// How long a buffer collects identities before dispatching, unless configured otherwise
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

pub type BatchResult<V> = Result<Arc<HashMap<Identity, V>>>;

/// The completion shared by every caller that pushed into the same buffer
pub type BatchJoin<V> = Shared<BoxFuture<'static, BatchResult<V>>>;

/// Collects identities for `delay`, then dispatches them all in one batch.
///
/// Every push landing in the same window gets a clone of the same [`BatchJoin`], so one failed
/// dispatch is seen by all of them. Nothing is retried.
pub struct CoalescingBuffer<V> {
    // `None` once the window has closed and the ids were handed to dispatch
    pending: Arc<Mutex<Option<Pending>>>,
    batch: BatchJoin<V>,
}

#[derive(Default)]
struct Pending {
    ids: Vec<Identity>,
    seen: HashSet<Identity>,
}

impl Pending {
    fn push(&mut self, id: Identity) {
        if self.seen.insert(id.clone()) {
            self.ids.push(id);
        }
    }
}

impl<V> CoalescingBuffer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Open a new window, `dispatch` is called exactly once when it closes.
    ///
    /// ### Note
    /// The window is driven by a task on the current Tokio runtime, calling this outside of one will panic.
    pub fn new<F, Fut>(dispatch: F, delay: Duration) -> Self
    where
        F: FnOnce(Vec<Identity>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<HashMap<Identity, V>>> + Send + 'static,
    {
        Self::open(dispatch, delay, Pending::default())
    }

    fn open<F, Fut>(dispatch: F, delay: Duration, first: Pending) -> Self
    where
        F: FnOnce(Vec<Identity>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<HashMap<Identity, V>>> + Send + 'static,
    {
        let pending = Arc::new(Mutex::new(Some(first)));
        let window = Arc::clone(&pending);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // close the window, any push from here on has to open a new buffer
            let ids = window.lock().take().map(|p| p.ids).unwrap_or_default();

            tracing::debug!(count = ids.len(), "dispatching batch");

            match dispatch(ids).await {
                Ok(items) => Ok(Arc::new(items)),
                Err(err) => {
                    tracing::error!(%err, "batch load failed");
                    Err(err)
                }
            }
        });

        CoalescingBuffer {
            pending,
            batch: async move {
                match handle.await {
                    Ok(result) => result,
                    Err(join_err) => Err(Error::from(join_err)),
                }
            }
            .boxed()
            .shared(),
        }
    }

    /// Add `id` to this window.
    ///
    /// Returns `None` if the window has already closed, the id is not part of this batch.
    pub fn push(&self, id: Identity) -> Option<BatchJoin<V>> {
        let mut pending = self.pending.lock();

        pending.as_mut()?.push(id);

        Some(self.batch.clone())
    }

    pub fn is_open(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// The number of distinct identities collected so far, zero once dispatched
    pub fn len(&self) -> usize {
        self.pending.lock().as_ref().map_or(0, |p| p.ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The cell holding the buffer currently collecting identities, if any.
///
/// Share one slot between many batch loaders (via `Arc`) to coalesce all of their requests together,
/// or give each loader its own to keep them apart.
pub struct BufferSlot<V> {
    inner: Mutex<SlotInner<V>>,
}

struct SlotInner<V> {
    next_generation: u64,
    active: Option<ActiveBuffer<V>>,
}

struct ActiveBuffer<V> {
    generation: u64,
    buffer: CoalescingBuffer<V>,
}

impl<V> BufferSlot<V> {
    pub fn new() -> Self {
        BufferSlot {
            inner: Mutex::new(SlotInner {
                next_generation: 0,
                active: None,
            }),
        }
    }

    /// Whether a buffer is currently collecting identities
    pub fn is_active(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    // only clears the slot if it still holds the buffer of `generation`
    fn retire(&self, generation: u64) {
        let mut inner = self.inner.lock();

        if inner
            .active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
        {
            inner.active = None;
        }
    }
}

impl<V> Default for BufferSlot<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> BufferSlot<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Push `id` into the active buffer, opening a new one that will dispatch to `fetch` if there is none.
    pub fn join<B>(self: &Arc<Self>, id: Identity, fetch: &Arc<B>, delay: Duration) -> BatchJoin<V>
    where
        B: BatchFetch<V>,
    {
        let mut inner = self.inner.lock();

        if let Some(active) = &inner.active {
            if let Some(join) = active.buffer.push(id.clone()) {
                return join;
            }
            // the window closed but dispatch hasnt retired it yet, replace it
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;

        let slot = Arc::clone(self);
        let fetch = Arc::clone(fetch);
        let dispatch = move |ids: Vec<Identity>| {
            // retire before any of the fetch runs so later pushes open a fresh buffer
            slot.retire(generation);

            async move { fetch.fetch(ids).await }
        };

        let mut first = Pending::default();
        first.push(id);

        let buffer = CoalescingBuffer::open(dispatch, delay, first);
        let join = buffer.batch.clone();

        inner.active = Some(ActiveBuffer { generation, buffer });

        join
    }
}

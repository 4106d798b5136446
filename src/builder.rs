use crate::batch::{Batch, BatchUncached};
use crate::buffer::{BufferSlot, DEFAULT_DELAY};
use crate::loader::BatchFetch;
use crate::retain::Retain;

use std::sync::Arc;
use std::time::Duration;

/// Configures a batching loader.
///
/// ```rust,ignore
/// static BOOKS: OnceLock<Arc<BufferSlot<Book>>> = OnceLock::new();
///
/// let books = BatchBuilder::new(fetch_books)
///     .delay_ms(10)
///     .slot(Arc::clone(BOOKS.get_or_init(Default::default)))
///     .build();
/// ```
pub struct BatchBuilder<F, V> {
    pub(crate) fetch: F,
    pub(crate) delay: Option<Duration>,
    pub(crate) slot: Option<Arc<BufferSlot<V>>>,
}

impl<F, V> BatchBuilder<F, V>
where
    F: BatchFetch<V>,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(fetch: F) -> Self {
        BatchBuilder {
            fetch,
            delay: None,
            slot: None,
        }
    }

    /// How long to collect identities before dispatching, 50ms if not set
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn delay_ms(self, delay_ms: u64) -> Self {
        self.delay(Duration::from_millis(delay_ms))
    }

    /// Use a buffer slot shared with other loaders so their requests land in the same batches.
    ///
    /// Without one, the loader gets a slot of its own.
    pub fn slot(mut self, slot: Arc<BufferSlot<V>>) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn build_uncached(self) -> BatchUncached<F, V> {
        let slot = self.slot.unwrap_or_else(|| Arc::new(BufferSlot::new()));

        BatchUncached::from_parts(self.fetch, slot, self.delay.unwrap_or(DEFAULT_DELAY))
    }

    pub fn build(self) -> Batch<F, V> {
        Retain::new(self.build_uncached())
    }
}

use crate::cache::{IdentityCache, Resolve, SlotState};
use crate::error::Result;
use crate::identity::{Collected, Identity};
use crate::loader::Loader;

use std::future::Future;
use std::sync::Arc;

/// Adds a per identity cache in front of any [`Loader`].
///
/// [`Retain::get`] starts at most one load per identity through the wrapped loader and hands back
/// the value once it has arrived, [`Retain::include`] bypasses the cache entirely.
pub struct Retain<L, V> {
    loader: Arc<L>,
    items: IdentityCache<Identity, V>,
}

impl<L, V> Retain<L, V>
where
    L: Loader<V>,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(loader: L) -> Self {
        Self::from_arc(Arc::new(loader))
    }

    /// Wrap a loader that is shared elsewhere, eg. to start over with an empty cache on the same loader
    pub fn from_arc(loader: Arc<L>) -> Self {
        Retain {
            loader,
            items: IdentityCache::new(),
        }
    }

    /// Get the item for `id` if it has been loaded, otherwise start loading it and return `None`.
    ///
    /// A failed load is logged and never retried by this cache.
    pub fn get(&self, id: &Identity) -> Option<V> {
        let loader = Arc::clone(&self.loader);
        let key = id.clone();

        self.items
            .get_or_load(id.clone(), move || async move { loader.include(key).await })
    }

    /// Wait for the item for `id`, starting the load if needed
    pub fn resolve(&self, id: &Identity) -> Resolve<V> {
        let loader = Arc::clone(&self.loader);
        let key = id.clone();

        self.items
            .resolve_with(id.clone(), move || async move { loader.include(key).await })
    }

    pub fn state(&self, id: &Identity) -> SlotState<V> {
        self.items.state(id)
    }

    /// Load `id` through the wrapped loader, ignoring and not touching the cache
    pub fn include(&self, id: Identity) -> impl Future<Output = Result<V>> + Send + '_ {
        self.loader.include(id)
    }

    pub fn abort(&self) -> bool {
        self.loader.abort()
    }

    pub fn loader(&self) -> &Arc<L> {
        &self.loader
    }

    pub fn cache(&self) -> &IdentityCache<Identity, V> {
        &self.items
    }
}

impl<L, V> Loader<V> for Retain<L, V>
where
    L: Loader<V>,
    V: Clone + Send + Sync + 'static,
{
    fn include(&self, id: Identity) -> impl Future<Output = Result<V>> + Send {
        self.loader.include(id)
    }

    fn abort(&self) -> bool {
        self.loader.abort()
    }
}

impl<L, V> Collected<V> for Retain<L, V>
where
    L: Loader<V>,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, id: &Identity) -> Option<V> {
        Retain::get(self, id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::batch::Batch;
    use crate::builder::BatchBuilder;
    use crate::error::Error;
    use crate::loader::loader_fn;
    use crate::test_util::CaptureWriter;

    use hashbrown::HashMap;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct Abortable {
        aborted: AtomicBool,
    }

    impl Loader<String> for Abortable {
        async fn include(&self, id: Identity) -> Result<String> {
            Ok(id.to_string())
        }

        fn abort(&self) -> bool {
            self.aborted.store(true, Ordering::SeqCst);
            true
        }
    }

    fn counting(calls: &Arc<AtomicUsize>) -> impl Loader<String> {
        let calls = Arc::clone(calls);

        loader_fn(move |id: Identity| {
            calls.fetch_add(1, Ordering::SeqCst);

            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;

                match id {
                    Identity::Int(i) if i < 0 => Err(Error::load("negative ids are rejected")),
                    id => Ok(format!("item {id}")),
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_starts_one_load_per_identity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retain = Retain::new(counting(&calls));

        assert_eq!(retain.get(&Identity::from(1)), None);
        assert_eq!(retain.get(&Identity::from(1)), None);
        assert!(retain.state(&Identity::from(1)).is_pending());

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(retain.get(&Identity::from(1)).as_deref(), Some("item 1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_include_bypasses_the_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retain = Retain::new(counting(&calls));

        assert_eq!(retain.include(Identity::from(2)).await.unwrap(), "item 2");
        assert_eq!(retain.include(Identity::from(2)).await.unwrap(), "item 2");

        assert!(retain.cache().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_identity_stays_failed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retain = Retain::new(counting(&calls));

        assert!(retain.resolve(&Identity::from(-1)).await.is_err());
        assert_eq!(retain.get(&Identity::from(-1)), None);
        assert!(retain.state(&Identity::from(-1)).is_failed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_passes_through() {
        let retain = Retain::new(Abortable {
            aborted: AtomicBool::new(false),
        });

        assert!(retain.abort());
        assert!(retain.loader().aborted.load(Ordering::SeqCst));

        let calls = Arc::new(AtomicUsize::new(0));
        assert!(!Retain::new(counting(&calls)).abort());
    }

    #[tokio::test]
    async fn test_collected_get_through_trait_object() {
        let retain = Retain::new(Abortable {
            aborted: AtomicBool::new(false),
        });
        let collected: &dyn Collected<String> = &retain;

        assert_eq!(collected.get(&Identity::from("x")), None);
        assert_eq!(retain.resolve(&Identity::from("x")).await.unwrap(), "x");
        assert_eq!(collected.get(&Identity::from("x")).as_deref(), Some("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_is_logged_once() {
        let (logs, _guard) = CaptureWriter::install();

        let batch: Batch<_, String> = BatchBuilder::new(|_ids: Vec<Identity>| async {
            Err::<HashMap<Identity, String>, _>(Error::load("backend down"))
        })
        .delay_ms(10)
        .build();

        let (a, b, c) = tokio::join!(
            batch.resolve(&Identity::from(1)),
            batch.resolve(&Identity::from(2)),
            batch.resolve(&Identity::from(3)),
        );

        assert!(a.is_err() && b.is_err() && c.is_err());
        assert!(batch.state(&Identity::from(2)).is_failed());
        assert_eq!(logs.lines_at("ERROR"), 1);
    }
}

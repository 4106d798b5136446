mod walk;

use crate::cache::{IdentityCache, Resolve, SlotState};
use crate::error::Result;
use crate::identity::{Collected, Identifiable, Identity};
use crate::loader::Loader;

use walk::Walk;

use futures::Stream;

use std::future::Future;
use std::sync::Arc;

/// One page of a collection load
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, C> {
    pub results: Vec<T>,
    /// Where to continue from, `None` on the last page
    pub cursor: Option<C>,
}

impl<T, C> Page<T, C> {
    pub fn next(results: Vec<T>, cursor: C) -> Self {
        Page {
            results,
            cursor: Some(cursor),
        }
    }

    pub fn last(results: Vec<T>) -> Self {
        Page {
            results,
            cursor: None,
        }
    }
}

/// A `PageLoad` fetches a collection one page at a time.
///
/// The cursor is whatever the backend continues from: a server side reference, the last matched id,
/// an offset. The filter and options are handed to every page unchanged.
pub trait PageLoad: Send + Sync + 'static {
    type Item: Identifiable + Clone + Send + Sync + 'static;
    type Filter: Send + Sync + 'static;
    type Options: Send + Sync + 'static;
    type Cursor: Send + 'static;

    fn load_page(
        &self,
        filter: Option<&Self::Filter>,
        options: Option<&Self::Options>,
        cursor: Option<Self::Cursor>,
    ) -> impl Future<Output = Result<Page<Self::Item, Self::Cursor>>> + Send;

    fn abort(&self) -> bool {
        false
    }
}

/// A collection whose identities are not known up front, walked page by page on demand.
///
/// Everything a walk sees is retained, so later point lookups by identity hit the cache.
/// [`OnDemand::get`] never loads anything itself, use [`OnDemand::with_loader`] for that.
pub struct OnDemand<P: PageLoad> {
    pages: Arc<P>,
    items: IdentityCache<Identity, P::Item>,
}

impl<P: PageLoad> OnDemand<P> {
    pub fn new(pages: P) -> Self {
        OnDemand {
            pages: Arc::new(pages),
            items: IdentityCache::new(),
        }
    }

    /// Walk every page and return all of the items at once
    pub async fn get_all(
        &self,
        filter: Option<P::Filter>,
        options: Option<P::Options>,
    ) -> Result<Vec<P::Item>> {
        let mut walk = self.walk(filter, options);
        let mut items = Vec::new();

        while let Some(page) = walk.next_page().await {
            items.extend(page?);
        }

        Ok(items)
    }

    /// Walk every page, yielding each item as soon as its page arrives.
    ///
    /// The stream ends after the last page, or right after yielding the error of a failed page.
    /// It cannot be restarted, call this again for a fresh walk.
    pub fn get_all_iterable(
        &self,
        filter: Option<P::Filter>,
        options: Option<P::Options>,
    ) -> impl Stream<Item = Result<P::Item>> + Send + 'static {
        self.walk(filter, options).into_stream()
    }

    /// The item for `id` if a walk has already seen it
    pub fn get(&self, id: &Identity) -> Option<P::Item> {
        self.items.peek(id)
    }

    pub fn state(&self, id: &Identity) -> SlotState<P::Item> {
        self.items.state(id)
    }

    pub fn abort(&self) -> bool {
        self.pages.abort()
    }

    pub fn pages(&self) -> &P {
        &self.pages
    }

    pub fn cache(&self) -> &IdentityCache<Identity, P::Item> {
        &self.items
    }

    /// Fall back to `loader` for identities no walk has seen yet
    pub fn with_loader<L>(self, loader: L) -> AllBatch<P, L>
    where
        L: Loader<P::Item>,
    {
        AllBatch {
            walker: self,
            loader: Arc::new(loader),
        }
    }

    fn walk(&self, filter: Option<P::Filter>, options: Option<P::Options>) -> Walk<P> {
        Walk::new(Arc::clone(&self.pages), self.items.clone(), filter, options)
    }
}

impl<P: PageLoad> Collected<P::Item> for OnDemand<P> {
    fn get(&self, id: &Identity) -> Option<P::Item> {
        OnDemand::get(self, id)
    }
}

/// A paginated collection that can also load single items by identity, usually through a
/// [`crate::BatchUncached`] so those point lookups are coalesced.
///
/// Walks and point lookups share one cache.
pub struct AllBatch<P: PageLoad, L> {
    walker: OnDemand<P>,
    loader: Arc<L>,
}

impl<P, L> AllBatch<P, L>
where
    P: PageLoad,
    L: Loader<P::Item>,
{
    pub fn new(pages: P, loader: L) -> Self {
        OnDemand::new(pages).with_loader(loader)
    }

    /// Get the item for `id` if it is loaded, otherwise start loading it and return `None`
    pub fn get(&self, id: &Identity) -> Option<P::Item> {
        let loader = Arc::clone(&self.loader);
        let key = id.clone();

        self.walker
            .items
            .get_or_load(id.clone(), move || async move { loader.include(key).await })
    }

    pub fn resolve(&self, id: &Identity) -> Resolve<P::Item> {
        let loader = Arc::clone(&self.loader);
        let key = id.clone();

        self.walker
            .items
            .resolve_with(id.clone(), move || async move { loader.include(key).await })
    }

    pub async fn get_all(
        &self,
        filter: Option<P::Filter>,
        options: Option<P::Options>,
    ) -> Result<Vec<P::Item>> {
        self.walker.get_all(filter, options).await
    }

    pub fn get_all_iterable(
        &self,
        filter: Option<P::Filter>,
        options: Option<P::Options>,
    ) -> impl Stream<Item = Result<P::Item>> + Send + 'static {
        self.walker.get_all_iterable(filter, options)
    }

    pub fn state(&self, id: &Identity) -> SlotState<P::Item> {
        self.walker.state(id)
    }

    /// Abort through the item loader, the page loader is left alone
    pub fn abort(&self) -> bool {
        self.loader.abort()
    }

    pub fn walker(&self) -> &OnDemand<P> {
        &self.walker
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

impl<P, L> Loader<P::Item> for AllBatch<P, L>
where
    P: PageLoad,
    L: Loader<P::Item>,
{
    fn include(&self, id: Identity) -> impl Future<Output = Result<P::Item>> + Send {
        self.loader.include(id)
    }

    fn abort(&self) -> bool {
        self.loader.abort()
    }
}

impl<P, L> Collected<P::Item> for AllBatch<P, L>
where
    P: PageLoad,
    L: Loader<P::Item>,
{
    fn get(&self, id: &Identity) -> Option<P::Item> {
        AllBatch::get(self, id)
    }
}

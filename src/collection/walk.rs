use crate::cache::IdentityCache;
use crate::error::Result;
use crate::identity::{Identifiable, Identity};

use super::{Page, PageLoad};

use futures::stream::{self, Stream};

use std::collections::VecDeque;
use std::sync::Arc;

/// The state of one pass over a paginated collection
pub(super) struct Walk<P: PageLoad> {
    pages: Arc<P>,
    items: IdentityCache<Identity, P::Item>,
    filter: Option<P::Filter>,
    options: Option<P::Options>,
    cursor: Option<P::Cursor>,
    buffered: VecDeque<P::Item>,
    done: bool,
}

impl<P: PageLoad> Walk<P> {
    pub(super) fn new(
        pages: Arc<P>,
        items: IdentityCache<Identity, P::Item>,
        filter: Option<P::Filter>,
        options: Option<P::Options>,
    ) -> Self {
        Walk {
            pages,
            items,
            filter,
            options,
            cursor: None,
            buffered: VecDeque::new(),
            done: false,
        }
    }

    /// Load the next page, merging its items into the cache.
    ///
    /// Returns `None` once the previous page came back without a cursor.
    pub(super) async fn next_page(&mut self) -> Option<Result<Vec<P::Item>>> {
        if self.done {
            return None;
        }

        let page = self
            .pages
            .load_page(self.filter.as_ref(), self.options.as_ref(), self.cursor.take())
            .await;

        let Page { results, cursor } = match page {
            Ok(page) => page,
            Err(err) => {
                tracing::error!(%err, "page load failed");
                self.done = true;

                return Some(Err(err));
            }
        };

        tracing::debug!(count = results.len(), more = cursor.is_some(), "loaded page");

        for item in &results {
            self.items.insert(item.id(), item.clone());
        }

        self.done = cursor.is_none();
        self.cursor = cursor;

        Some(Ok(results))
    }

    pub(super) fn into_stream(self) -> impl Stream<Item = Result<P::Item>> + Send + 'static {
        stream::unfold(self, |mut walk| async move {
            loop {
                if let Some(item) = walk.buffered.pop_front() {
                    return Some((Ok(item), walk));
                }

                match walk.next_page().await? {
                    Ok(items) => walk.buffered.extend(items),
                    Err(err) => return Some((Err(err), walk)),
                }
            }
        })
    }
}

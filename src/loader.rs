use crate::error::Result;
use crate::identity::Identity;

use futures::TryFutureExt;
use hashbrown::HashMap;

use std::future::Future;

/// A `Loader` fetches a single item by identity, with no memory of its own.
///
/// Wrap one in a [`crate::Retain`] to cache what it loads.
///
/// A loader logs its own failures, caches only record them at debug level.
pub trait Loader<V>: Send + Sync + 'static {
    fn include(&self, id: Identity) -> impl Future<Output = Result<V>> + Send;

    /// Try to cancel outstanding loads, returning whether that is supported at all.
    fn abort(&self) -> bool {
        false
    }
}

/// A `BatchFetch` loads many items in one go.
///
/// The returned map should cover every identity it could find, anything missing is reported to
/// its caller as [`crate::Error::NotFound`].
pub trait BatchFetch<V>: Send + Sync + 'static {
    fn fetch(&self, ids: Vec<Identity>) -> impl Future<Output = Result<HashMap<Identity, V>>> + Send;
}

impl<V, F, Fut> BatchFetch<V> for F
where
    F: Fn(Vec<Identity>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HashMap<Identity, V>>> + Send,
{
    fn fetch(&self, ids: Vec<Identity>) -> impl Future<Output = Result<HashMap<Identity, V>>> + Send {
        self(ids)
    }
}

/// A [`Loader`] backed by a plain async function, see [`loader_fn`]
#[derive(Clone)]
pub struct FnLoader<F> {
    f: F,
}

pub fn loader_fn<F>(f: F) -> FnLoader<F> {
    FnLoader { f }
}

impl<V, F, Fut> Loader<V> for FnLoader<F>
where
    F: Fn(Identity) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send,
{
    fn include(&self, id: Identity) -> impl Future<Output = Result<V>> + Send {
        let key = id.clone();

        (self.f)(id).inspect_err(move |err| tracing::error!(id = %key, %err, "load failed"))
    }
}

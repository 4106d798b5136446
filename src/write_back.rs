use crate::cache::{IdentityCache, Resolve, SlotState};
use crate::error::{Error, Result};

use futures::future::{BoxFuture, FutureExt, TryFutureExt};
use parking_lot::Mutex;

use std::future::Future;

type ValueLoader<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T>> + Send>;

/// A single value loaded on first read, for objects that have one expensive property.
///
/// Reads never block: [`OnDemandValue::value`] is `None` until the load has finished, and stays
/// `None` for good if it failed.
///
/// ```rust,ignore
/// struct Calculator {
///     value: u32,
///     units: OnDemandValue<String>,
/// }
///
/// impl Calculator {
///     fn result(&self) -> Option<String> {
///         Some(format!("{}{}", self.value, self.units.value()?))
///     }
/// }
/// ```
pub struct OnDemandValue<T> {
    // taken by the first read
    loader: Mutex<Option<ValueLoader<T>>>,
    value: IdentityCache<(), T>,
}

impl<T> OnDemandValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let boxed: ValueLoader<T> = Box::new(move || loader().boxed());

        OnDemandValue {
            loader: Mutex::new(Some(boxed)),
            value: IdentityCache::with_capacity(1),
        }
    }

    /// The value if it has loaded, starting the load on the first call.
    ///
    /// ### Note
    /// The load is spawned onto the current Tokio runtime, the first call outside of one will panic.
    pub fn value(&self) -> Option<T> {
        self.value.get_or_load((), || self.take_loader())
    }

    /// Wait for the value, starting the load if nobody has read it yet
    pub fn resolve(&self) -> Resolve<T> {
        self.value.resolve_with((), || self.take_loader())
    }

    pub fn state(&self) -> SlotState<T> {
        self.value.state(&())
    }

    fn take_loader(&self) -> BoxFuture<'static, Result<T>> {
        match self.loader.lock().take() {
            Some(loader) => loader()
                .inspect_err(|err| tracing::error!(%err, "value load failed"))
                .boxed(),
            // unreachable, the value slot starts its load at most once
            None => async { Err(Error::Interrupted("loader already taken".to_string())) }.boxed(),
        }
    }
}
